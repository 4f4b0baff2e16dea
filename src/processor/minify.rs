//! Minifying post-processors, oxc for JavaScript and lightningcss for CSS.
//!
//! Minification failure is never fatal: a member that does not parse is
//! passed through unchanged with a warning, so one broken file cannot
//! take the whole build pass down.

use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;

use crate::error::EngineError;
use crate::log;

use super::{BundleProcessingStatus, PostProcessor};

fn minify_js(source: &str) -> Option<String> {
    let allocator = Allocator::default();
    let source_type = SourceType::mjs();
    let ret = Parser::new(&allocator, source, source_type).parse();
    if !ret.errors.is_empty() {
        return None;
    }
    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Some(code)
}

fn minify_css(source: &str) -> Option<String> {
    let stylesheet = StyleSheet::parse(source, ParserOptions::default()).ok()?;
    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .ok()?;
    Some(result.code)
}

#[derive(Debug)]
pub struct JsMinProcessor;

impl PostProcessor for JsMinProcessor {
    fn name(&self) -> &str {
        "jsmin"
    }

    fn post_process(
        &self,
        status: &BundleProcessingStatus,
        content: String,
    ) -> Result<String, EngineError> {
        match minify_js(&content) {
            Some(minified) => Ok(minified),
            None => {
                log!(
                    "warning";
                    "could not minify [{}] in bundle [{}], content kept as-is",
                    status.last_path,
                    status.bundle.id
                );
                Ok(content)
            }
        }
    }
}

#[derive(Debug)]
pub struct CssMinProcessor;

impl PostProcessor for CssMinProcessor {
    fn name(&self) -> &str {
        "cssmin"
    }

    fn post_process(
        &self,
        status: &BundleProcessingStatus,
        content: String,
    ) -> Result<String, EngineError> {
        match minify_css(&content) {
            Some(minified) => Ok(minified),
            None => {
                log!(
                    "warning";
                    "could not minify [{}] in bundle [{}], content kept as-is",
                    status.last_path,
                    status.bundle.id
                );
                Ok(content)
            }
        }
    }
}
