pub mod daily;
pub mod health;
pub mod last_commit;
pub mod projects;
