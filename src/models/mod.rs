pub mod task;
pub mod user;

pub use task::{Task, TaskInput, TaskPatch, TaskQuery};
pub use user::{CurrentUser, Profile, ProfileUpdate, User};
