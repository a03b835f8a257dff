use std::collections::BTreeSet;

use mp_core::{ParserMode, ProblemType, ResponseValue};
use mp_formula::SeededRandom;
use mp_problem::{load_template, ProblemTemplate, RealizeOptions, XmlContent};

const MULTIPLE_CHOICE: &str = r#"<problem type="multiplechoice">
  <ref-base>algebra.pick-the-square</ref-base>
  <num-choices><expr>4</expr></num-choices>
  <random-order><expr>true</expr></random-order>
  <var name="n" type="random-int"><min><expr>2</expr></min><max><expr>9</expr></max></var>
  <var name="sq" type="derived"><expr>{n} * {n}</expr></var>
  <question><p>Which value is the square of {n}?</p></question>
  <choice id="1"><correct><expr>true</expr></correct><content><p>{sq}</p></content></choice>
  <choice id="2"><correct><expr>false</expr></correct><content><p>{n}</p></content></choice>
  <choice id="3"><correct><expr>false</expr></correct><content><p>{n} + 1</p></content></choice>
  <choice id="4"><correct><expr>false</expr></correct><content><p>2 * {n}</p></content></choice>
  <choice id="5"><correct><expr>false</expr></correct><content><p>None of these</p></content></choice>
</problem>"#;

const MULTIPLE_SELECTION: &str = r#"<problem type="multipleselection">
  <ref-base>number.evens</ref-base>
  <num-choices><expr>4</expr></num-choices>
  <random-order><expr>true</expr></random-order>
  <min-correct><expr>1</expr></min-correct>
  <max-correct><expr>2</expr></max-correct>
  <question><p>Select the even numbers.</p></question>
  <choice id="1" correct="TRUE"><content><p>2</p></content></choice>
  <choice id="2" correct="TRUE"><content><p>4</p></content></choice>
  <choice id="3" correct="TRUE"><content><p>6</p></content></choice>
  <choice id="4" correct="FALSE"><content><p>3</p></content></choice>
  <choice id="5" correct="FALSE"><content><p>5</p></content></choice>
  <choice id="6" correct="FALSE"><content><p>7</p></content></choice>
</problem>"#;

const SEQUENTIAL: &str = r#"<problem type="multiplechoice">
  <ref-base>geometry.sides</ref-base>
  <num-choices><expr>3</expr></num-choices>
  <question><p>How many sides does a triangle have?</p></question>
  <choice id="10" correct="FALSE"><content><p>2</p></content></choice>
  <choice id="20" correct="FALSE"><content><p>4</p></content></choice>
  <choice id="30" correct="TRUE"><content><p>3</p></content></choice>
  <choice id="40" correct="FALSE"><content><p>5</p></content></choice>
</problem>"#;

const FIXED_POSITION: &str = r#"<problem type="multiplechoice">
  <ref-base>misc.fixed-slot</ref-base>
  <random-order><expr>true</expr></random-order>
  <question><p>Pick one.</p></question>
  <choice id="1" correct="FALSE"><content><p>first</p></content></choice>
  <choice id="2" correct="FALSE"><content><p>second</p></content></choice>
  <choice id="3" correct="TRUE" position="2"><content><p>anchored</p></content></choice>
  <choice id="4" correct="FALSE"><content><p>fourth</p></content></choice>
</problem>"#;

fn load(source: &str) -> ProblemTemplate {
    let mut content = XmlContent::new(source);
    let template = load_template(&mut content, ParserMode::NORMAL);
    assert!(
        !content.has_errors(),
        "unexpected diagnostics: {:?}",
        content.diagnostics().entries()
    );
    assert!(!template.is_dummy());
    template
}

fn presented_correct(template: &ProblemTemplate) -> usize {
    let choices = template.kind.choices().expect("choice problem");
    let order = template.choice_order().expect("realized order");
    order
        .iter()
        .filter(|&&index| {
            choices.choices[index]
                .is_correct(&template.eval_context)
                .expect("boolean correctness")
        })
        .count()
}

#[test]
fn choice_order_is_a_set_of_valid_indices() {
    let mut template = load(MULTIPLE_CHOICE);
    for seed in 1..=40 {
        let mut rng = SeededRandom::new(Some(seed));
        assert!(template.realize(&mut rng), "seed {} failed", seed);
        let order = template.choice_order().expect("order").to_vec();
        assert_eq!(order.len(), 4);
        let distinct = order.iter().collect::<BTreeSet<_>>();
        assert_eq!(distinct.len(), order.len(), "duplicate index in {:?}", order);
        assert!(order.iter().all(|&index| index < 5));
    }
}

#[test]
fn multiple_choice_presents_exactly_one_correct_choice() {
    let mut random = load(MULTIPLE_CHOICE);
    let mut sequential = load(SEQUENTIAL);
    for seed in 1..=40 {
        let mut rng = SeededRandom::new(Some(seed));
        let instance = random.create_iteration(&mut rng).expect("instance");
        assert_eq!(instance.choices().len(), 4);
        assert_eq!(presented_correct(&random), 1);

        assert!(sequential.realize(&mut rng));
        assert_eq!(presented_correct(&sequential), 1);
    }
}

#[test]
fn multiple_selection_respects_correct_bounds() {
    let mut template = load(MULTIPLE_SELECTION);
    assert_eq!(template.problem_type(), ProblemType::MultipleSelection);
    for seed in 1..=60 {
        let mut rng = SeededRandom::new(Some(seed));
        assert!(template.realize(&mut rng), "seed {} failed", seed);
        let correct = presented_correct(&template);
        assert!((1..=2).contains(&correct), "seed {} presented {}", seed, correct);
    }
}

#[test]
fn fixed_position_survives_shuffling() {
    let mut template = load(FIXED_POSITION);
    for seed in 1..=50 {
        let mut rng = SeededRandom::new(Some(seed));
        let instance = template.create_iteration(&mut rng).expect("instance");
        assert_eq!(template.choice_order().expect("order")[1], 2);
        assert_eq!(instance.choices()[1].choice_id(), 3);
    }
}

#[test]
fn sequential_order_is_stable_across_realizations() {
    let mut template = load(SEQUENTIAL);
    let mut rng = SeededRandom::new(Some(7));
    assert!(template.realize(&mut rng));
    let first = template.choice_order().expect("order").to_vec();
    for _ in 0..10 {
        assert!(template.realize(&mut rng));
        assert_eq!(template.choice_order(), Some(first.as_slice()));
    }
    // Incorrect choices fill in declaration order, reserving a slot for the correct one.
    assert_eq!(first, vec![0, 1, 2]);
}

#[test]
fn deep_copy_is_equal_and_independent() {
    let mut template = load(MULTIPLE_CHOICE);
    let mut rng = SeededRandom::new(Some(3));
    assert!(template.realize(&mut rng));
    template
        .record_answer(&[ResponseValue::Long(1)])
        .expect("valid answer");

    let mut copy = template.deep_copy();
    assert_eq!(copy.answer(), None);
    assert_eq!(copy.completion_time(), 0);
    assert_eq!(copy.choice_order(), template.choice_order());
    assert_eq!(copy.eval_context, template.eval_context);

    template.clear_answer();
    assert_eq!(copy, template);

    let before = template.clone();
    let mut other = SeededRandom::new(Some(99));
    assert!(copy.realize(&mut other));
    copy.record_answer(&[ResponseValue::Long(2)])
        .expect("valid answer");
    assert_eq!(template, before);
}

#[test]
fn realization_is_computed_without_side_effects() {
    let template = load(MULTIPLE_CHOICE);
    let before = template.clone();
    let mut rng = SeededRandom::new(Some(11));
    let realization = template
        .try_realize(&mut rng, &RealizeOptions::default())
        .expect("realization");
    assert_eq!(template, before);
    assert_eq!(realization.instance.iteration_id().len(), 9);
    assert!(realization
        .instance
        .iteration_id()
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));

    let mut installed = template.clone();
    let order = realization.choice_order.clone();
    installed.install(realization);
    assert_eq!(installed.choice_order().map(<[usize]>::to_vec), order);
}

#[test]
fn same_seed_reproduces_the_same_instance() {
    let mut first = load(MULTIPLE_CHOICE);
    let mut second = load(MULTIPLE_CHOICE);
    let a = first
        .create_iteration(&mut SeededRandom::new(Some(42)))
        .expect("instance");
    let b = second
        .create_iteration(&mut SeededRandom::new(Some(42)))
        .expect("instance");
    assert_eq!(a, b);
}
