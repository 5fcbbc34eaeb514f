mod client;
mod identifiers;

pub use client::{GhCli, GithubError, IssueTitleBody, MergeStrategy, ReviewAction};
pub use identifiers::{
    parse_issue_number, parse_pr_number, IssueNumber, OutputContractError, PrNumber,
};
