pub mod guild;
pub mod interaction;

pub use guild::handle_member_add;
pub use interaction::handle_interaction;
