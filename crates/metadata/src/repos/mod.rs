//! Repository traits for metadata operations.

pub mod articles;
pub mod issues;
pub mod submissions;
pub mod users;
pub mod volumes;

pub use articles::ArticleRepo;
pub use issues::IssueRepo;
pub use submissions::SubmissionRepo;
pub use users::UserRepo;
pub use volumes::VolumeRepo;
