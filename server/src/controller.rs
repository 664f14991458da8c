pub use user::UserController;

mod user;
