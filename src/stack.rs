//! Native stack growth for the recursive tree walkers.
//!
//! The emitter and the interpreter recurse once per nesting level of the
//! syntax tree, and user code can recurse up to the configured call depth.
//! Both wrap their recursive step in [`ensure_sufficient_stack`]. The parser
//! cannot, since pest recurses internally, so a whole parse runs on one
//! large segment instead.

/// Grow when less than this remains.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const STACK_PER_RECURSION: usize = 2 * 1024 * 1024;

#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Stack for one parse; the grammar recurses natively up to the nesting limit.
const PARSER_STACK: usize = 64 * 1024 * 1024;

/// Run `f` on a fresh stack segment sized for the parser.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn with_parser_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::grow(PARSER_STACK, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn with_parser_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_does_not_overflow() {
        assert_eq!(depth(200_000), 200_000);
    }
}
