//! CLI Exit Code Registry
//!
//! Single source of truth for exit codes. Exit codes are part of the
//! shell contract — batch scripts scheduling report runs rely on them.
//!
//! | Code | Meaning                                          |
//! |------|--------------------------------------------------|
//! | 0    | Success                                          |
//! | 1    | General error (unspecified)                      |
//! | 2    | Usage error (bad args, missing file)             |
//! | 3    | Partial render (some sheets failed to bind)      |

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Render completed but at least one sheet was left unbound.
/// The output file exists; inspect the warnings before distributing it.
pub const EXIT_RENDER_PARTIAL: u8 = 3;
