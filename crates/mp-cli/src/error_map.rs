use mp_core::ProblemError;

const FALLBACK_CODE: &str = "CLI_ERROR";

pub(crate) fn error_code(error: &anyhow::Error) -> &str {
    error
        .downcast_ref::<ProblemError>()
        .map(|error| error.code.as_str())
        .unwrap_or(FALLBACK_CODE)
}

pub(crate) fn emit_error(error: anyhow::Error) -> i32 {
    let message = match error.downcast_ref::<ProblemError>() {
        Some(problem) => problem.message.clone(),
        None => format!("{:#}", error),
    };
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error_code(&error));
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&message).unwrap_or_else(|_| format!("{:?}", message))
    );
    1
}
