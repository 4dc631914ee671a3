// ABOUTME: SeaORM entities module for database models and relationships
// ABOUTME: Exports entity definitions for accounts and evidence records

pub mod account;
pub mod evidence;

pub use account::Entity as Account;
pub use evidence::Entity as Evidence;
