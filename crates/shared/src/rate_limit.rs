//! Turns model and run errors into messages a user can act on.
//!
//! Matching is case-insensitive keyword search over the error text. Every
//! rate limit message ends with the raw error so the cause stays visible.

fn technical_details(error_type: &str, error: &str) -> String {
    format!("**Technical details:** {error_type}: {error}")
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

/// Whether the error text mentions a rate limit, a quota or HTTP 429.
pub fn mentions_rate_limit(error: &str) -> bool {
    let lower = error.to_lowercase();
    contains_any(&lower, &["rate limit", "quota", "429"])
}

fn generic_rate_limit(error_type: &str, error: &str) -> String {
    format!(
        "⚠️ **Rate Limit Exceeded**\n\n\
         A rate limit has been exceeded, but the specific type could not be determined.\n\n\
         **Suggestions:**\n\
         • Wait a moment before retrying\n\
         • Check your API usage and limits\n\
         • Consider reducing request frequency or size\n\n\
         {}",
        technical_details(error_type, error)
    )
}

/// The specific limit message for `error`, or `None` when it is not a
/// rate, quota or usage limit.
pub fn classify_limit(error_type: &str, error: &str) -> Option<String> {
    let lower = error.to_lowercase();
    let details = technical_details(error_type, error);

    if mentions_rate_limit(&lower) {
        let message = if contains_any(&lower, &["token", "tpm", "tokens per minute"]) {
            format!(
                "⚠️ **Rate Limit Exceeded: Tokens Per Minute (TPM)**\n\n\
                 The request exceeded the allowed tokens per minute limit. \
                 This typically means too many tokens are being processed in a short time period.\n\n\
                 **Suggestions:**\n\
                 • Wait a moment before retrying\n\
                 • Reduce the length of your input\n\
                 • Break large requests into smaller chunks\n\n\
                 {details}"
            )
        } else if contains_any(
            &lower,
            &["request", "rpm", "requests per minute", "too many requests"],
        ) {
            format!(
                "⚠️ **Rate Limit Exceeded: Requests Per Minute (RPM)**\n\n\
                 The request exceeded the allowed requests per minute limit. \
                 This typically means too many API calls are being made in a short time period.\n\n\
                 **Suggestions:**\n\
                 • Wait a moment before retrying\n\
                 • Reduce the frequency of requests\n\
                 • Implement request batching if possible\n\n\
                 {details}"
            )
        } else if lower.contains("azure") && contains_any(&lower, &["openai", "cognitive"]) {
            format!(
                "⚠️ **Azure OpenAI Quota Exceeded**\n\n\
                 Your Azure OpenAI service quota has been exceeded. This could be either \
                 tokens per minute (TPM) or requests per minute (RPM).\n\n\
                 **Suggestions:**\n\
                 • Check your Azure OpenAI resource usage in the Azure portal\n\
                 • Wait for the quota to reset\n\
                 • Consider upgrading your Azure OpenAI pricing tier\n\n\
                 {details}"
            )
        } else if lower.contains("openai") {
            format!(
                "⚠️ **OpenAI Quota Exceeded**\n\n\
                 Your OpenAI API quota has been exceeded. This could be either \
                 tokens per minute (TPM) or requests per minute (RPM).\n\n\
                 **Suggestions:**\n\
                 • Check your OpenAI API usage dashboard\n\
                 • Wait for the quota to reset\n\
                 • Consider upgrading your OpenAI plan\n\n\
                 {details}"
            )
        } else {
            generic_rate_limit(error_type, error)
        };
        return Some(message);
    }

    if contains_any(&lower, &["usage", "limit"]) && contains_any(&lower, &["openai", "azure"]) {
        let message = if lower.contains("azure") {
            format!(
                "⚠️ **Azure Service Usage Limit Reached**\n\n\
                 Your Azure service has reached its usage limit.\n\n\
                 **Suggestions:**\n\
                 • Check your Azure resource usage in the Azure portal\n\
                 • Wait for the limit to reset\n\
                 • Consider upgrading your service tier\n\n\
                 {details}"
            )
        } else {
            format!(
                "⚠️ **OpenAI Usage Limit Reached**\n\n\
                 Your OpenAI API has reached its usage limit.\n\n\
                 **Suggestions:**\n\
                 • Check your OpenAI API usage dashboard\n\
                 • Wait for the limit to reset\n\
                 • Consider upgrading your OpenAI plan\n\n\
                 {details}"
            )
        };
        return Some(message);
    }

    None
}

/// User-facing message for a failed model call.
pub fn describe_model_error(error_type: &str, error: &str) -> String {
    classify_limit(error_type, error)
        .unwrap_or_else(|| format!("Error processing request: {error}"))
}

/// Structured error attached to a failed backing run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunFailure<'a> {
    pub raw: &'a str,
    pub code: Option<&'a str>,
    pub message: Option<&'a str>,
    pub kind: Option<&'a str>,
    pub param: Option<&'a str>,
}

/// User-facing message for a run that ended in `failed`.
///
/// A `rate_limit_exceeded` code, or rate limit / quota wording in the raw
/// error, yields limit guidance; everything else is reported verbatim with
/// whichever fields are present.
pub fn describe_run_failure(failure: &RunFailure<'_>) -> String {
    let lower = failure.raw.to_lowercase();
    let is_rate_limit = failure.code == Some("rate_limit_exceeded")
        || lower.contains("rate limit")
        || lower.contains("quota");

    if is_rate_limit {
        return classify_limit("RunError", failure.raw)
            .unwrap_or_else(|| generic_rate_limit("RunError", failure.raw));
    }

    let mut info = format!("Run error: {}", failure.raw);
    for (label, value) in [
        ("Code", failure.code),
        ("Message", failure.message),
        ("Type", failure.kind),
        ("Param", failure.param),
    ] {
        if let Some(value) = value {
            info.push_str(&format!(" ({label}: {value})"));
        }
    }
    format!("Error processing request: {info}")
}
