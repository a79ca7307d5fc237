//! Validation of generated infrastructure definitions.
//!
//! A definition is accepted only when it parses as HCL and declares either
//! a `provider` block or a top-level `terraform` block. Rejected text is
//! never persisted to the definition file; it survives only inside the
//! error message for diagnostic display.

use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DefinitionError {
    #[error("**Validation Error:** generated definition is not valid HCL. Details: {detail}\n\n---\n{text}")]
    Parse { detail: String, text: String },
    #[error("Error: generated definition is missing a provider or terraform block.\n---\n{text}")]
    MissingProvider { text: String },
}

/// Checks a full replacement definition. Runs on every generation, no
/// exceptions.
pub fn validate_definition(text: &str) -> Result<(), DefinitionError> {
    let body = hcl::parse(text).map_err(|err| DefinitionError::Parse {
        detail: err.to_string(),
        text: text.to_string(),
    })?;

    let has_provider = body
        .blocks()
        .any(|block| matches!(block.identifier.as_str(), "provider" | "terraform"));
    if !has_provider {
        return Err(DefinitionError::MissingProvider { text: text.to_string() });
    }

    Ok(())
}

/// Strips markdown code fences the model sometimes wraps around raw HCL.
pub fn strip_code_fences(text: &str) -> String {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```hcl")
        .or_else(|| trimmed.strip_prefix("```terraform"))
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let without_close = without_open.strip_suffix("```").unwrap_or(without_open);
    without_close.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::{strip_code_fences, validate_definition, DefinitionError};

    const VALID: &str = r#"
provider "aws" {
  region = "us-east-1"
}

resource "aws_instance" "api-server" {
  ami           = "ami-0c02fb55956c7d316"
  instance_type = "t2.micro"
}
"#;

    #[test]
    fn accepts_definition_with_provider_block() {
        assert!(validate_definition(VALID).is_ok());
    }

    #[test]
    fn accepts_definition_with_terraform_block_only() {
        let text = r#"
terraform {
  required_providers {
    aws = { source = "hashicorp/aws" }
  }
}
"#;
        assert!(validate_definition(text).is_ok());
    }

    #[test]
    fn rejects_unparseable_text_with_detail() {
        let err = validate_definition("this is { not hcl").expect_err("must fail");
        match err {
            DefinitionError::Parse { text, .. } => assert!(text.contains("not hcl")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn rejects_definition_missing_provider_and_terraform() {
        let text = r#"
resource "aws_instance" "web" {
  instance_type = "t2.micro"
}
"#;
        let err = validate_definition(text).expect_err("must fail");
        assert!(matches!(err, DefinitionError::MissingProvider { .. }));
        assert!(err.to_string().contains("aws_instance"));
    }

    #[test]
    fn strips_hcl_fences() {
        let fenced = "```hcl\nprovider \"aws\" {}\n```";
        assert_eq!(strip_code_fences(fenced), "provider \"aws\" {}");
    }

    #[test]
    fn leaves_raw_text_alone() {
        assert_eq!(strip_code_fences("provider \"aws\" {}"), "provider \"aws\" {}");
    }
}
