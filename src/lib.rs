pub mod config;
pub mod error;
pub mod exec;
pub mod formula;
pub mod table;

pub use config::EngineConfig;
pub use error::{FormulaError, FormulaResult};
pub use exec::{evaluate, FormulaEngine};
pub use formula::{compile, CompiledFormula};

// Test-only printing helper: expands to eprintln! during tests and debug builds.
// Usage in tests: tprintln!("debug: {}", value);
#[cfg(any(test, debug_assertions))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ( eprintln!($($arg)*) );
}

// In release builds, provide a no-op tprintln! so calls compile without effect.
#[cfg(not(any(test, debug_assertions)))]
#[macro_export]
macro_rules! tprintln {
    ($($arg:tt)*) => ({
        // Preserve formatting checks in release without producing code
        if false { let _ = format!($($arg)*); }
    });
}
