use proc_macro::TokenStream;
use quote::{format_ident, quote, ToTokens};
use syn::{
    braced, bracketed,
    parse::{Parse, ParseStream},
    parse_macro_input, Expr, Ident, Token,
};

struct ExpectedViolationSpec {
    message: Option<Expr>,
    severity: Option<Expr>,
}

impl Parse for ExpectedViolationSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let content;
        braced!(content in input);
        let mut message = None;
        let mut severity = None;
        while !content.is_empty() {
            let key: Ident = content.parse()?;
            content.parse::<Token![=>]>()?;
            match &*key.to_string() {
                "message" => message = Some(content.parse()?),
                "severity" => severity = Some(content.parse()?),
                _ => panic!("didn't expect key '{key}'"),
            }
            if !content.is_empty() {
                content.parse::<Token![,]>()?;
            }
        }
        Ok(Self { message, severity })
    }
}

impl ExpectedViolationSpec {
    fn to_tokens_for(&self, crate_name: &Ident, tokens: &mut proc_macro2::TokenStream) {
        let message = match self.message.as_ref() {
            Some(message) => quote!(Some((#message).to_string())),
            None => quote!(None),
        };
        let severity = match self.severity.as_ref() {
            Some(severity) => quote!(Some(#severity)),
            None => quote!(None),
        };
        quote! {
            #crate_name::ExpectedViolation {
                message_contains: #message,
                severity: #severity,
            }
        }
        .to_tokens(tokens)
    }
}

struct InvalidRuleTestSpec {
    code: Expr,
    errors: Vec<ExpectedViolationSpec>,
    output: Option<Expr>,
}

impl Parse for InvalidRuleTestSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let content;
        braced!(content in input);
        let mut code = None;
        let mut errors = None;
        let mut output = None;
        while !content.is_empty() {
            let key: Ident = content.parse()?;
            content.parse::<Token![=>]>()?;
            match &*key.to_string() {
                "code" => code = Some(content.parse()?),
                "errors" => {
                    let array_content;
                    bracketed!(array_content in content);
                    let parsed =
                        array_content.parse_terminated(ExpectedViolationSpec::parse, Token![,])?;
                    errors = Some(parsed.into_iter().collect());
                }
                "output" => output = Some(content.parse()?),
                _ => panic!("didn't expect key '{key}'"),
            }
            if !content.is_empty() {
                content.parse::<Token![,]>()?;
            }
        }
        Ok(Self {
            code: code.expect("Expected 'code'"),
            errors: errors.expect("Expected 'errors'"),
            output,
        })
    }
}

impl InvalidRuleTestSpec {
    fn to_tokens_for(&self, crate_name: &Ident, tokens: &mut proc_macro2::TokenStream) {
        let code = &self.code;
        let mut errors_tokens = proc_macro2::TokenStream::new();
        for (i, error) in self.errors.iter().enumerate() {
            if i > 0 {
                errors_tokens.extend(quote!(,));
            }
            error.to_tokens_for(crate_name, &mut errors_tokens);
        }
        let output = match self.output.as_ref() {
            Some(output) => quote!(Some((#output).to_string())),
            None => quote!(None),
        };
        quote! {
            #crate_name::RuleTestInvalid {
                code: (#code).to_string(),
                errors: vec![#errors_tokens],
                output: #output,
            }
        }
        .to_tokens(tokens)
    }
}

struct RuleTestsSpec {
    valid: Vec<Expr>,
    invalid: Vec<InvalidRuleTestSpec>,
}

impl Parse for RuleTestsSpec {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        let mut valid: Vec<Expr> = Default::default();
        let mut invalid: Vec<InvalidRuleTestSpec> = Default::default();
        while !input.is_empty() {
            let key: Ident = input.parse()?;
            input.parse::<Token![=>]>()?;
            match &*key.to_string() {
                "valid" => {
                    let content;
                    bracketed!(content in input);
                    let parsed = content.parse_terminated(Expr::parse, Token![,])?;
                    valid = parsed.into_iter().collect();
                }
                "invalid" => {
                    let content;
                    bracketed!(content in input);
                    while !content.is_empty() {
                        invalid.push(content.parse()?);
                        if !content.is_empty() {
                            content.parse::<Token![,]>()?;
                        }
                    }
                }
                _ => panic!("didn't expect key '{key}'"),
            }
            if !input.is_empty() {
                input.parse::<Token![,]>()?;
            }
        }
        Ok(Self { valid, invalid })
    }
}

pub fn rule_tests_with_crate_name(input: TokenStream, crate_name: &str) -> TokenStream {
    let spec: RuleTestsSpec = parse_macro_input!(input);
    let crate_name = format_ident!("{}", crate_name);

    let valid = spec.valid.iter().map(|code| {
        quote! {
            #crate_name::RuleTestValid { code: (#code).to_string() }
        }
    });
    let mut invalid_tokens = proc_macro2::TokenStream::new();
    for (i, invalid) in spec.invalid.iter().enumerate() {
        if i > 0 {
            invalid_tokens.extend(quote!(,));
        }
        invalid.to_tokens_for(&crate_name, &mut invalid_tokens);
    }

    quote! {
        #crate_name::RuleTests {
            valid: vec![#(#valid),*],
            invalid: vec![#invalid_tokens],
        }
    }
    .into()
}
