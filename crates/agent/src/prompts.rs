//! Prompt construction for every completion call. The full turn history is
//! the entire context window; nothing else is ever sent to the model.

use terraloom_core::{Role, Turn};

pub fn render_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            format!("{role}: {}", turn.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn intent_classification(history: &[Turn]) -> String {
    format!(
        "You are a precise intent classifier for a cloud infrastructure assistant.\n\
         Classify the purpose of the LAST user message in the conversation below.\n\
         Respond with exactly one of these labels and nothing else:\n\
         CODE_MODIFICATION - the user wants infrastructure created, changed, or removed\n\
         DEBUGGING_INQUIRY - the user asks about the health or behavior of a live resource\n\
         GENERAL_CHAT - anything else\n\n\
         Conversation:\n{}\n\nLabel:",
        render_history(history)
    )
}

pub fn general_chat(history: &[Turn]) -> String {
    format!(
        "You are a helpful cloud infrastructure assistant. Answer the last user \
         message conversationally. Do not emit code unless the user asked for an example.\n\n\
         Conversation:\n{}\n\nAnswer:",
        render_history(history)
    )
}

pub fn clarification(history: &[Turn]) -> String {
    format!(
        "You review infrastructure requests before code generation. For every NEW resource \
         the user wants created, a user-supplied name or identifier is mandatory.\n\
         Return a JSON array of clarifying questions, one per missing name. If every \
         resource the user referenced already has a name, return exactly [].\n\
         Return ONLY the JSON array, no prose and no markdown fences.\n\n\
         Conversation:\n{}\n\nQuestions:",
        render_history(history)
    )
}

pub fn generate_from_scratch(history: &[Turn], default_region: &str) -> String {
    format!(
        "You are an expert DevOps engineer who writes lean, correct, and minimal Terraform \
         HCL for AWS. Write a complete `main.tf` file from scratch that fulfils the user's \
         request.\n\
         Rules:\n\
         1. Fulfil the request exactly as stated; do not add extra resources (logging \
         buckets, IAM roles, ...) unless explicitly requested.\n\
         2. The AWS provider block MUST include the region. Use `{default_region}`.\n\
         3. Return ONLY the raw HCL code, without markdown fences or explanations.\n\n\
         Conversation:\n{}\n\nWrite the Terraform code now.",
        render_history(history)
    )
}

pub fn generate_modification(history: &[Turn], existing_code: &str) -> String {
    format!(
        "You are an expert DevOps engineer who flawlessly modifies existing Terraform HCL. \
         Take the existing `main.tf` below and the user's latest request, and return a NEW, \
         COMPLETE, and VALID `main.tf` that incorporates the change.\n\
         Rules:\n\
         1. Return the entire, complete, updated file — never snippets or explanations.\n\
         2. If a new resource is depended on by an existing one, add it AND update the \
         existing resource to reference it.\n\
         3. Resource names must remain consistent unless the user asked to rename them.\n\n\
         Conversation:\n{}\n\n\
         Existing `main.tf` to modify:\n```hcl\n{existing_code}\n```\n\n\
         Return ONLY the full, updated, raw HCL for the new `main.tf`.",
        render_history(history)
    )
}

pub fn metric_extraction(history: &[Turn]) -> String {
    format!(
        "Extract the monitoring target from the conversation below. Respond with ONLY a \
         JSON object of this exact shape, no fences:\n\
         {{\"resource_id\": \"...\", \"metric_name\": \"...\", \"namespace\": \"...\", \
         \"dimension_key\": \"...\"}}\n\
         Example for an EC2 instance: {{\"resource_id\": \"i-0abc123\", \"metric_name\": \
         \"CPUUtilization\", \"namespace\": \"AWS/EC2\", \"dimension_key\": \"InstanceId\"}}\n\
         Use null for anything the user did not provide.\n\n\
         Conversation:\n{}\n\nJSON:",
        render_history(history)
    )
}

pub fn metric_reasoning(history: &[Turn], metrics_report: &str) -> String {
    format!(
        "You are a cloud diagnostics assistant. Using the metric data below, answer the \
         user's question about their resource. Mention concrete numbers where available; if \
         there is no data or the query failed, say so plainly and suggest what to check.\n\n\
         Conversation:\n{}\n\nMetric data (most recent 3 hours, 5-minute resolution):\n\
         {metrics_report}\n\nAnswer:",
        render_history(history)
    )
}
