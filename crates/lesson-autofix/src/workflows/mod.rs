pub mod autofix;
