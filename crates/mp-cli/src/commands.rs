use anyhow::Context;
use mp_core::{Diagnostics, ParserMode, ProblemError, ResponseValue};
use mp_formula::SeededRandom;
use mp_problem::{
    infer_variable_types, load_template, render_problem_html, ParamMap, ProblemInstance,
    ProblemTemplate, RealizeOptions,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::{
    collect_problem_files, load_problem, read_problem_file, CheckArgs, GradeArgs, RealizeArgs,
};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GradeReport {
    pub(crate) reference: String,
    pub(crate) iteration_id: String,
    pub(crate) answered: bool,
    pub(crate) correct: bool,
    pub(crate) answer: Option<Vec<ResponseValue>>,
    pub(crate) html: String,
}

pub(crate) fn run_check(args: CheckArgs) -> anyhow::Result<i32> {
    let mode = if args.strict {
        ParserMode::STRICT
    } else {
        ParserMode::NORMAL
    };
    let files = collect_problem_files(&args.paths)?;
    let mut failed = 0;

    for file in &files {
        let mut content = read_problem_file(file)?;
        let mut template = load_template(&mut content, mode);
        let mut inference = Diagnostics::new();
        if !template.is_dummy() {
            infer_variable_types(&mut template, &mut inference);
        }

        let ok = !content.has_errors() && !inference.has_errors() && !template.is_dummy();
        if !ok {
            failed += 1;
        }
        println!("{} {}", if ok { "OK" } else { "FAIL" }, file.display());
        for entry in content
            .diagnostics()
            .entries()
            .iter()
            .chain(inference.entries())
        {
            println!("  {}", entry);
        }
        debug!(file = %file.display(), problem_type = ?template.problem_type(), "checked");
    }

    println!("CHECKED:{} FAILED:{}", files.len(), failed);
    Ok(if failed == 0 { 0 } else { 1 })
}

fn realize(template: &mut ProblemTemplate, seed: Option<u32>) -> anyhow::Result<ProblemInstance> {
    let mut rng = SeededRandom::new(seed);
    let realization = template
        .try_realize(&mut rng, &RealizeOptions::default())
        .with_context(|| format!("realizing {}", template.ref_base))?;
    info!(reference = %template.ref_base, "problem realized");
    Ok(template.install(realization))
}

pub(crate) fn run_realize(args: RealizeArgs) -> anyhow::Result<i32> {
    let mut template = load_problem(&args.file)?;
    let instance = realize(&mut template, args.seed)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&instance)?);
    } else {
        print!("{}", render_problem_html(&instance));
    }
    Ok(0)
}

/// Builds the submitted form parameters; a repeated key collects several values.
pub(crate) fn parse_answer_params(answers: &[String]) -> Result<ParamMap, ProblemError> {
    let mut params = ParamMap::new();
    for answer in answers {
        let Some((key, value)) = answer.split_once('=') else {
            return Err(ProblemError::new(
                "CLI_ANSWER_INVALID",
                format!("expected KEY=VALUE, got '{}'", answer),
            ));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(ProblemError::new(
                "CLI_ANSWER_INVALID",
                format!("missing parameter name in '{}'", answer),
            ));
        }
        params
            .entry(key.to_string())
            .or_default()
            .push(value.to_string());
    }
    Ok(params)
}

pub(crate) fn grade(
    template: &mut ProblemTemplate,
    instance: &ProblemInstance,
    params: &ParamMap,
) -> Result<GradeReport, ProblemError> {
    let html = render_problem_html(instance);
    template.extract_answers(params)?;
    Ok(GradeReport {
        reference: template.ref_base.clone(),
        iteration_id: instance.iteration_id().to_string(),
        answered: template.is_answered(),
        correct: template.is_answer_correct(),
        answer: template.answer(),
        html: template.insert_answers(&html),
    })
}

pub(crate) fn run_grade(args: GradeArgs) -> anyhow::Result<i32> {
    let params = parse_answer_params(&args.answers)?;
    let mut template = load_problem(&args.file)?;
    let instance = realize(&mut template, args.seed)?;
    let report = grade(&mut template, &instance, &params)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    print!("{}", template.to_xml());
    Ok(0)
}

