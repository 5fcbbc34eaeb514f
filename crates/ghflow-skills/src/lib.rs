mod docs;
mod scripts;

pub use docs::{issue_doc_path, review_doc_path, task_doc_path, tracked_doc_paths};
pub use scripts::{ApprovalStatus, SkillError, SkillScript, SkillScripts};
