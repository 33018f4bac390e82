use bitflags::bitflags;

bitflags! {
    /// Lookup behavior attached to a path expression.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PathFlags: u8 {
        /// As a call target, the path must name a registered helper. A
        /// missing one is a render error instead of a `helperMissing` call.
        const STRICT = 1;
        /// A falsy intermediate segment ends the lookup quietly instead of
        /// raising, even when the template was compiled strict.
        const FALSY = 1 << 1;
        /// The path was written with a leading `this`/`./`, so it never names
        /// a helper.
        const SCOPED = 1 << 2;
    }
}

