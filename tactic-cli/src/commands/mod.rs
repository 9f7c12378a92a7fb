pub mod game;
pub mod identity;
pub mod ledger;

pub use game::TermsArgs;
pub use identity::{handle_identity_command, IdentityCommands};
pub use ledger::{handle_ledger_command, LedgerCommands};
