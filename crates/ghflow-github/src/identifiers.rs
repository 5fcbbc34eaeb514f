use std::fmt;
use std::str::FromStr;

use thiserror::Error;

const MAX_QUOTED_OUTPUT: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OutputContractError {
    #[error("no {kind} number found in command output: {output:?}")]
    MissingIdentifier { kind: &'static str, output: String },
    #[error("invalid {kind} number '{value}': expected a positive integer")]
    InvalidIdentifier { kind: &'static str, value: String },
}

macro_rules! github_number {
    ($name:ident, $kind:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(u64);

        impl $name {
            pub fn new(value: u64) -> Result<Self, OutputContractError> {
                if value == 0 {
                    return Err(OutputContractError::InvalidIdentifier {
                        kind: $kind,
                        value: value.to_string(),
                    });
                }
                Ok(Self(value))
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = OutputContractError;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let trimmed = raw.trim();
                let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
                let invalid = || OutputContractError::InvalidIdentifier {
                    kind: $kind,
                    value: raw.to_owned(),
                };
                if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
                    return Err(invalid());
                }

                let value = digits.parse::<u64>().map_err(|_| invalid())?;
                Self::new(value)
            }
        }
    };
}

github_number!(IssueNumber, "issue");
github_number!(PrNumber, "pull request");

/// Reads an issue number from helper or `gh` output.
///
/// The contract is checked in order: the final whitespace-separated token when
/// it is a (optionally `#`-prefixed) number, then an `/issues/<n>` URL
/// fragment. Anything else is an error rather than a silent miss.
pub fn parse_issue_number(output: &str) -> Result<IssueNumber, OutputContractError> {
    parse_identifier(output, "/issues/", "issue").and_then(IssueNumber::new)
}

/// Same contract as [`parse_issue_number`] with a `/pull/<n>` URL fragment.
pub fn parse_pr_number(output: &str) -> Result<PrNumber, OutputContractError> {
    parse_identifier(output, "/pull/", "pull request").and_then(PrNumber::new)
}

fn parse_identifier(
    output: &str,
    url_segment: &str,
    kind: &'static str,
) -> Result<u64, OutputContractError> {
    if let Some(value) = final_token_number(output) {
        return Ok(value);
    }
    if let Some(value) = url_fragment_number(output, url_segment) {
        return Ok(value);
    }

    Err(OutputContractError::MissingIdentifier {
        kind,
        output: truncate_for_error(output.trim()),
    })
}

fn final_token_number(output: &str) -> Option<u64> {
    let token = output.split_whitespace().last()?;
    let digits = token.strip_prefix('#').unwrap_or(token);
    if digits.is_empty() || !digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    digits.parse::<u64>().ok()
}

fn url_fragment_number(output: &str, url_segment: &str) -> Option<u64> {
    output
        .rmatch_indices(url_segment)
        .find_map(|(index, segment)| {
            let digits = output[index + segment.len()..]
                .chars()
                .take_while(|ch| ch.is_ascii_digit())
                .collect::<String>();
            digits.parse::<u64>().ok()
        })
}

fn truncate_for_error(body: &str) -> String {
    if body.chars().count() <= MAX_QUOTED_OUTPUT {
        body.to_owned()
    } else {
        format!("{}...", body.chars().take(MAX_QUOTED_OUTPUT).collect::<String>())
    }
}
