//! Source locations used to label telemetry
//!
//! A [`CallSite`] is captured once, at the dispatch boundary, and travels with
//! every event of that dispatch. Capture never fails: anything that cannot be
//! resolved is filled with [`CallSite::UNKNOWN`].

use serde::Serialize;
use std::fmt;
use std::panic::Location;

/// Placeholder used for every field that could not be resolved
pub const UNKNOWN: &str = "<unknown>";

/// Location of the code that started a dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CallSite {
    pub file: &'static str,
    pub function: &'static str,
    pub line: u32,
    pub column: u32,
    /// Module path plus function name, e.g. `crawler::fetch::page`
    pub qualified_name: &'static str,
}

impl CallSite {
    pub const UNKNOWN: Self = Self {
        file: UNKNOWN,
        function: UNKNOWN,
        line: 0,
        column: 0,
        qualified_name: UNKNOWN,
    };

    /// Build a call site from a qualified function path as produced by
    /// [`call_site!`](crate::call_site).
    ///
    /// Trailing closure segments are stripped so that a capture inside an
    /// `async` block reports the enclosing function.
    #[must_use]
    pub fn new(file: &'static str, qualified: &'static str, line: u32, column: u32) -> Self {
        let mut qualified_name = qualified;
        while let Some(outer) = qualified_name.strip_suffix("::{{closure}}") {
            qualified_name = outer;
        }
        if qualified_name.is_empty() {
            qualified_name = UNKNOWN;
        }
        let function = qualified_name
            .rsplit("::")
            .next()
            .filter(|name| !name.is_empty())
            .unwrap_or(UNKNOWN);

        Self {
            file,
            function,
            line,
            column,
            qualified_name,
        }
    }

    /// Capture the location of the caller.
    ///
    /// Every `#[track_caller]` function between the capture point and the
    /// user code is skipped, so the reported frame is the first one above the
    /// public entry point. The function name is not available this way and is
    /// reported as [`UNKNOWN`].
    #[must_use]
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        Self {
            file: location.file(),
            function: UNKNOWN,
            line: location.line(),
            column: location.column(),
            qualified_name: UNKNOWN,
        }
    }

    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.file == UNKNOWN
    }
}

impl Default for CallSite {
    fn default() -> Self {
        Self::UNKNOWN
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} in {}", self.file, self.line, self.qualified_name)
    }
}

/// Capture the current source location including the enclosing function.
///
/// ```
/// fn load_page() -> sempool_types::CallSite {
///     sempool_types::call_site!()
/// }
///
/// let site = load_page();
/// assert_eq!(site.function, "load_page");
/// ```
#[macro_export]
macro_rules! call_site {
    () => {{
        fn __sempool_here() {}
        fn __sempool_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __sempool_name_of(__sempool_here);
        $crate::CallSite::new(
            file!(),
            name.strip_suffix("::__sempool_here").unwrap_or(name),
            line!(),
            column!(),
        )
    }};
}
