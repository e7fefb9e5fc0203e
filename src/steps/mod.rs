//! Steps and step lists.
//!
//! - [`Step`] - one repository mutation plus its abort, continue and undo
//!   counterparts
//! - [`StepList`] - the ordered list a command hands to the runner
//!
//! # Example
//!
//! ```
//! use branchline::git::MemoryRepository;
//! use branchline::steps::{Step, StepList, WrapOptions};
//!
//! let mut repo = MemoryRepository::new("main");
//! repo.add_open_change("notes.txt");
//!
//! let mut list = StepList::new();
//! list.append(Step::CheckoutBranch { branch: "main".into() });
//! list.wrap(WrapOptions { run_in_repo_root: true, stash_open_changes: true }, &repo).unwrap();
//!
//! assert_eq!(list.peek(), Some(&Step::StashOpenChanges));
//! ```

pub mod list;
pub mod step;

pub use list::{StepList, WrapOptions};
pub use step::Step;
