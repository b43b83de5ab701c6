use proc_macro::TokenStream;

mod rule_tests;
mod violation;

/// Builds a `Violation` value from `key => value` pairs, e.g.:
///
/// ```ignore
/// violation!(
///     rule_id => "line-length",
///     range => range,
///     severity => Severity::Warning,
///     message => format!("line exceeds {max} characters"),
/// )
/// ```
#[proc_macro]
pub fn violation(input: TokenStream) -> TokenStream {
    violation::violation_with_crate_name(input, "styler")
}

/// Same as `violation!`, for use inside `styler`'s own rule modules, where
/// `::styler::...` paths don't resolve because the crate can't refer to
/// itself by name.
#[proc_macro]
pub fn violation_crate_internal(input: TokenStream) -> TokenStream {
    violation::violation_with_crate_name(input, "crate")
}

/// Builds a `RuleTests` value from `valid => [...]` and `invalid => [...]` blocks,
/// mirroring the `valid`/`invalid` shape of ESLint-style rule test suites.
#[proc_macro]
pub fn rule_tests(input: TokenStream) -> TokenStream {
    rule_tests::rule_tests_with_crate_name(input, "styler")
}

/// Same as `rule_tests!`, for use inside `styler`'s own rule modules.
#[proc_macro]
pub fn rule_tests_crate_internal(input: TokenStream) -> TokenStream {
    rule_tests::rule_tests_with_crate_name(input, "crate")
}
