use std::fmt;

/// Prefixes trace messages with the function that emits them,
/// indented by nesting depth.
///
/// Tracing is switched on per component (see `LogConfig`), not
/// through the logger's filter, so the parser and the writer stacks
/// can be traced independently.
pub(crate) struct Tracer {
    enabled: bool,
    func: &'static str,
    depth: usize,
}

impl Tracer {
    pub(crate) fn new(enabled: bool, func: &'static str, depth: usize) -> Self {
        Tracer { enabled, func, depth }
    }

    pub(crate) fn log(&self, args: fmt::Arguments) {
        if self.enabled {
            log::trace!("{:depth$}{}: {}", "", self.func, args,
                        depth = 2 * self.depth);
        }
    }
}

// t!(tracer, "format", args...)
macro_rules! t {
    ( $tracer:expr, $($arg:tt)* ) => {
        $tracer.log(format_args!($($arg)*))
    };
}

/// Implements `Arbitrary` for an enum that converts from a `u8`.
#[cfg(test)]
macro_rules! impl_arbitrary_from_u8 {
    ( $t:ty ) => {
        impl quickcheck::Arbitrary for $t {
            fn arbitrary(g: &mut quickcheck::Gen) -> Self {
                <u8 as quickcheck::Arbitrary>::arbitrary(g).into()
            }
        }
    };
}
