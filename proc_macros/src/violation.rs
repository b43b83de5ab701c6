use proc_macro::TokenStream;
use quote::{format_ident, quote};
use syn::{
    parse::{Parse, ParseStream},
    parse_macro_input, Expr, Ident, Token,
};

struct ViolationSpec {
    rule_id: Option<Expr>,
    range: Expr,
    severity: Option<Expr>,
    message: Expr,
    fix: Option<Expr>,
}

impl Parse for ViolationSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut rule_id: Option<Expr> = None;
        let mut range: Option<Expr> = None;
        let mut severity: Option<Expr> = None;
        let mut message: Option<Expr> = None;
        let mut fix: Option<Expr> = None;

        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=>]>()?;
            match &*key.to_string() {
                "rule_id" => {
                    assert!(rule_id.is_none(), "Already saw 'rule_id'");
                    rule_id = Some(input.parse()?);
                }
                "range" => {
                    assert!(range.is_none(), "Already saw 'range'");
                    range = Some(input.parse()?);
                }
                "severity" => {
                    assert!(severity.is_none(), "Already saw 'severity'");
                    severity = Some(input.parse()?);
                }
                "message" => {
                    assert!(message.is_none(), "Already saw 'message'");
                    message = Some(input.parse()?);
                }
                "fix" => {
                    assert!(fix.is_none(), "Already saw 'fix'");
                    fix = Some(input.parse()?);
                }
                _ => panic!("Unexpected key: '{key}'"),
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }

        Ok(Self {
            rule_id,
            range: range.expect("Expected 'range' key"),
            severity,
            message: message.expect("Expected 'message' key"),
            fix,
        })
    }
}

/// `crate_name` is `"styler"` for the macro downstream rule authors import,
/// and `"crate"` for the variant used by this crate's own rule modules —
/// mirroring the teacher's `violation`/`violation_crate_internal` split, so
/// the generated path resolves whether or not `styler` is the invoking
/// crate itself.
pub fn violation_with_crate_name(input: TokenStream, crate_name: &str) -> TokenStream {
    let spec: ViolationSpec = parse_macro_input!(input);
    let crate_name = format_ident!("{}", crate_name);

    let range = &spec.range;
    let message = &spec.message;

    let rule_id = match spec.rule_id.as_ref() {
        Some(rule_id) => quote!(.rule_id(#rule_id)),
        None => quote!(),
    };

    let severity = match spec.severity.as_ref() {
        Some(severity) => quote!(.severity(#severity)),
        None => quote!(),
    };

    let fix = match spec.fix.as_ref() {
        Some(fix) => quote!(.suggested_fix(Some(#fix))),
        None => quote!(),
    };

    quote! {
        #crate_name::ViolationBuilder::default()
            #rule_id
            .range(#range)
            #severity
            .message(#message)
            #fix
            .build()
            .unwrap()
    }
    .into()
}
