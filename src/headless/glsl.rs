// SPDX-License-Identifier: LGPL-3.0-or-later OR MPL-2.0
// This file is a part of `airhockey-hardware`.
//
// `airhockey-hardware` is free software: you can redistribute it and/or modify it under the
// terms of either:
//
// * GNU Lesser General Public License as published by the Free Software Foundation, either
//   version 3 of the License, or (at your option) any later version.
// * Mozilla Public License as published by the Mozilla Foundation, version 2.
//
// `airhockey-hardware` is distributed in the hope that it will be useful, but WITHOUT ANY
// WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR
// PURPOSE. See the GNU Lesser General Public License or the Mozilla Public License for more
// details.
//
// You should have received a copy of the GNU Lesser General Public License and the Mozilla
// Public License along with `airhockey-hardware`. If not, see <https://www.gnu.org/licenses/>.

//! Just enough GLSL to tell a well-formed shader from a broken one, and to find out what
//! goes in and out of it.
//!
//! This checks the shape of top-level declarations, balanced delimiters, statement
//! termination and the `main` function. Expressions are not type checked.

use crate::gpu_backend::ShaderStage;

use std::fmt;

const TYPES: &[&str] = &[
    "void", "bool", "int", "uint", "float", "vec2", "vec3", "vec4", "bvec2", "bvec3", "bvec4",
    "ivec2", "ivec3", "ivec4", "uvec2", "uvec3", "uvec4", "mat2", "mat3", "mat4", "mat2x2",
    "mat2x3", "mat2x4", "mat3x2", "mat3x3", "mat3x4", "mat4x2", "mat4x3", "mat4x4",
    "sampler2D", "sampler3D", "samplerCube", "sampler2DArray",
];

const PRECISIONS: &[&str] = &["lowp", "mediump", "highp"];

const INTERPOLATION: &[&str] = &["invariant", "flat", "smooth", "noperspective", "centroid"];

/// An error found while compiling a shader, formatted like a driver's info log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CompileError {
    /// 1-based source line.
    pub(crate) line: usize,
    pub(crate) message: String,
}

impl CompileError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ERROR: 0:{}: {}", self.line, self.message)
    }
}

/// A named, typed global.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Variable {
    pub(crate) name: String,
    pub(crate) ty: String,
}

/// What a compiled shader reads and writes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Interface {
    /// Per-vertex attributes, or varyings read by a fragment shader, in declaration order.
    pub(crate) inputs: Vec<Variable>,

    /// Varyings written by a vertex shader, or a fragment shader's color outputs.
    pub(crate) outputs: Vec<Variable>,

    pub(crate) uniforms: Vec<Variable>,
}

/// The interface of a linked program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Linked {
    /// Attribute `i` lives at location `i`.
    pub(crate) attributes: Vec<Variable>,

    /// Uniform `i` lives at location `i`.
    pub(crate) uniforms: Vec<Variable>,
}

/// Compile `source` for `stage`.
pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<Interface, CompileError> {
    let tokens = Lexer::new(source).tokenize()?;
    check_delimiters(&tokens)?;

    Parser {
        tokens: &tokens,
        pos: 0,
        stage,
        interface: Interface::default(),
        mains: 0,
    }
    .parse()
}

/// Link a vertex and a fragment interface together.
///
/// Every varying must be written by the vertex stage and read by the fragment stage with
/// the same type. On failure, returns the info log.
pub(crate) fn link(vertex: &Interface, fragment: &Interface) -> Result<Linked, String> {
    let mut log = String::new();

    for input in &fragment.inputs {
        match vertex.outputs.iter().find(|output| output.name == input.name) {
            None => log.push_str(&format!(
                "error: fragment shader input `{}` is not written by the vertex shader\n",
                input.name
            )),
            Some(output) if output.ty != input.ty => log.push_str(&format!(
                "error: `{}` is {} in the vertex shader but {} in the fragment shader\n",
                input.name, output.ty, input.ty
            )),
            Some(_) => {}
        }
    }

    for output in &vertex.outputs {
        if !fragment.inputs.iter().any(|input| input.name == output.name) {
            log.push_str(&format!(
                "error: vertex shader output `{}` is not read by the fragment shader\n",
                output.name
            ));
        }
    }

    let mut uniforms = vertex.uniforms.clone();
    for uniform in &fragment.uniforms {
        match uniforms.iter().find(|existing| existing.name == uniform.name) {
            None => uniforms.push(uniform.clone()),
            Some(existing) if existing.ty != uniform.ty => log.push_str(&format!(
                "error: uniform `{}` is {} in the vertex shader but {} in the fragment shader\n",
                uniform.name, existing.ty, uniform.ty
            )),
            Some(_) => {}
        }
    }

    if log.is_empty() {
        Ok(Linked {
            attributes: vertex.inputs.clone(),
            uniforms,
        })
    } else {
        Err(log)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number,
    Punct(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(ident) => write!(f, "'{ident}'"),
            Token::Number => f.write_str("number"),
            Token::Punct(c) => write!(f, "'{c}'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Spanned {
    token: Token,
    line: usize,
}

struct Lexer<'s> {
    src: &'s str,
    pos: usize,
    line: usize,
    /// Whether only whitespace has been seen since the last newline.
    line_start: bool,
}

impl<'s> Lexer<'s> {
    fn new(src: &'s str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            line_start: true,
        }
    }

    fn tokenize(mut self) -> Result<Vec<Spanned>, CompileError> {
        let mut tokens = Vec::new();

        while let Some(token) = self.next_token()? {
            tokens.push(Spanned {
                token,
                line: self.line,
            });
        }

        Ok(tokens)
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();

        if ch == '\n' {
            self.line += 1;
            self.line_start = true;
        } else if !ch.is_whitespace() {
            self.line_start = false;
        }

        Some(ch)
    }

    fn skip_line(&mut self) {
        while !matches!(self.peek(), None | Some('\n')) {
            self.advance();
        }
    }

    fn skip_trivia(&mut self) -> Result<(), CompileError> {
        loop {
            while matches!(self.peek(), Some(c) if c.is_whitespace()) {
                self.advance();
            }

            if self.rest().starts_with("//") {
                self.skip_line();
            } else if self.rest().starts_with("/*") {
                let start = self.line;
                self.advance();
                self.advance();

                loop {
                    if self.rest().starts_with("*/") {
                        self.advance();
                        self.advance();
                        break;
                    }

                    if self.advance().is_none() {
                        return Err(CompileError::new(start, "unterminated comment"));
                    }
                }
            } else if self.line_start && self.peek() == Some('#') {
                // Preprocessor directives are accepted and ignored.
                self.skip_line();
            } else {
                return Ok(());
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Token>, CompileError> {
        self.skip_trivia()?;

        let ch = match self.peek() {
            None => return Ok(None),
            Some(c) => c,
        };

        let token = match ch {
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
                    self.advance();
                }
                Token::Ident(self.src[start..self.pos].to_owned())
            }
            c if c.is_ascii_digit() || (c == '.' && self.starts_fraction()) => {
                self.lex_number();
                Token::Number
            }
            '+' | '-' | '*' | '/' | '%' | '=' | '<' | '>' | '!' | '&' | '|' | '^' | '~' | '?'
            | ':' | ';' | ',' | '.' | '(' | ')' | '{' | '}' | '[' | ']' => {
                self.advance();
                Token::Punct(ch)
            }
            other => {
                return Err(CompileError::new(
                    self.line,
                    format!("unexpected character {other:?}"),
                ))
            }
        };

        Ok(Some(token))
    }

    fn starts_fraction(&self) -> bool {
        self.rest()[1..]
            .chars()
            .next()
            .map_or(false, |c| c.is_ascii_digit())
    }

    fn lex_number(&mut self) {
        let mut prev = '\0';
        while let Some(c) = self.peek() {
            let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
            if !(c.is_ascii_alphanumeric() || c == '.' || exponent_sign) {
                break;
            }
            prev = c;
            self.advance();
        }
    }
}

fn check_delimiters(tokens: &[Spanned]) -> Result<(), CompileError> {
    let mut open = Vec::new();

    for spanned in tokens {
        let closes = match spanned.token {
            Token::Punct(c @ ('(' | '[' | '{')) => {
                open.push((c, spanned.line));
                continue;
            }
            Token::Punct(')') => '(',
            Token::Punct(']') => '[',
            Token::Punct('}') => '{',
            _ => continue,
        };

        match open.pop() {
            Some((c, _)) if c == closes => {}
            _ => {
                return Err(CompileError::new(
                    spanned.line,
                    format!("syntax error, unexpected {}", spanned.token),
                ))
            }
        }
    }

    match open.pop() {
        Some((c, line)) => Err(CompileError::new(
            line,
            format!("syntax error, '{c}' is never closed"),
        )),
        None => Ok(()),
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Storage {
    In,
    Out,
    Uniform,
    Attribute,
    Varying,
    Const,
}

impl Storage {
    fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "in" => Storage::In,
            "out" => Storage::Out,
            "uniform" => Storage::Uniform,
            "attribute" => Storage::Attribute,
            "varying" => Storage::Varying,
            "const" => Storage::Const,
            _ => return None,
        })
    }
}

struct Parser<'t> {
    tokens: &'t [Spanned],
    pos: usize,
    stage: ShaderStage,
    interface: Interface,
    mains: usize,
}

impl<'t> Parser<'t> {
    fn parse(mut self) -> Result<Interface, CompileError> {
        while self.pos < self.tokens.len() {
            if self.eat(';') {
                continue;
            }

            self.external_declaration()?;
        }

        match self.mains {
            1 => Ok(self.interface),
            0 => Err(CompileError::new(
                self.line(),
                "missing function definition for 'main'",
            )),
            _ => Err(CompileError::new(self.line(), "function 'main' redefined")),
        }
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(1, |spanned| spanned.line)
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn peek_ident(&self) -> Option<&'t str> {
        match self.peek() {
            Some(Token::Ident(ident)) => Some(ident.as_str()),
            _ => None,
        }
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expecting: &str) -> CompileError {
        match self.peek() {
            Some(token) => CompileError::new(
                self.line(),
                format!("syntax error, unexpected {token}, expecting {expecting}"),
            ),
            None => CompileError::new(
                self.line(),
                format!("syntax error, unexpected end of file, expecting {expecting}"),
            ),
        }
    }

    fn expect(&mut self, punct: char) -> Result<(), CompileError> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("'{punct}'")))
        }
    }

    fn expect_ident(&mut self) -> Result<&'t str, CompileError> {
        match self.peek_ident() {
            Some(ident) => {
                self.pos += 1;
                Ok(ident)
            }
            None => Err(self.unexpected("an identifier")),
        }
    }

    fn expect_type(&mut self) -> Result<&'t str, CompileError> {
        let line = self.line();
        let ty = self.expect_ident()?;

        if TYPES.contains(&ty) {
            Ok(ty)
        } else {
            Err(CompileError::new(line, format!("'{ty}' : unknown type")))
        }
    }

    /// Skip past the delimiter that closes the one just consumed.
    fn skip_group(&mut self) {
        let mut depth = 1usize;

        while let Some(token) = self.peek() {
            self.pos += 1;
            match token {
                Token::Punct('(' | '[' | '{') => depth += 1,
                Token::Punct(')' | ']' | '}') => {
                    depth -= 1;
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    fn external_declaration(&mut self) -> Result<(), CompileError> {
        let line = self.line();

        match self.peek_ident() {
            Some("precision") => {
                self.pos += 1;
                let precision = self.expect_ident()?;
                if !PRECISIONS.contains(&precision) {
                    return Err(CompileError::new(
                        line,
                        format!("'{precision}' : not a precision qualifier"),
                    ));
                }
                self.expect_type()?;
                return self.expect(';');
            }
            Some("struct") => {
                return Err(CompileError::new(line, "'struct' : not supported"));
            }
            _ => {}
        }

        let mut storage = None;
        loop {
            match self.peek_ident() {
                Some("layout") => {
                    self.pos += 1;
                    self.expect('(')?;
                    self.skip_group();
                }
                Some(ident) if INTERPOLATION.contains(&ident) || PRECISIONS.contains(&ident) => {
                    self.pos += 1;
                }
                Some(ident) => match Storage::from_keyword(ident) {
                    Some(qualifier) => {
                        if storage.is_some() {
                            return Err(CompileError::new(
                                line,
                                format!("'{ident}' : too many storage qualifiers"),
                            ));
                        }
                        storage = Some(qualifier);
                        self.pos += 1;
                    }
                    None => break,
                },
                None => return Err(self.unexpected("a declaration")),
            }
        }

        let ty = self.expect_type()?;
        let name = self.expect_ident()?;

        if self.eat('(') {
            if storage.is_some() {
                return Err(CompileError::new(
                    line,
                    format!("'{name}' : functions cannot have storage qualifiers"),
                ));
            }
            return self.function(line, ty, name);
        }

        self.variables(line, storage, ty, name)
    }

    fn function(&mut self, line: usize, ty: &str, name: &str) -> Result<(), CompileError> {
        let params_start = self.pos;
        self.skip_group();
        let params = &self.tokens[params_start..self.pos - 1];

        if self.eat(';') {
            return Ok(());
        }

        self.expect('{')?;
        let body_start = self.pos;
        self.skip_group();
        check_statements(&self.tokens[body_start - 1..self.pos])?;

        if name == "main" {
            let no_params = match params {
                [] => true,
                [spanned] => spanned.token == Token::Ident("void".into()),
                _ => false,
            };

            if ty != "void" || !no_params {
                return Err(CompileError::new(
                    line,
                    "'main' : function must take no parameters and return void",
                ));
            }

            self.mains += 1;
        }

        Ok(())
    }

    fn variables(
        &mut self,
        line: usize,
        storage: Option<Storage>,
        ty: &str,
        mut name: &'t str,
    ) -> Result<(), CompileError> {
        loop {
            if self.eat('[') {
                self.skip_group();
            }

            if self.eat('=') {
                while !matches!(self.peek(), None | Some(Token::Punct(',' | ';'))) {
                    if let Some(Token::Punct('(' | '[')) = self.peek() {
                        self.pos += 1;
                        self.skip_group();
                    } else {
                        self.pos += 1;
                    }
                }
            }

            self.declare(line, storage, ty, name)?;

            if self.eat(',') {
                name = self.expect_ident()?;
            } else {
                return self.expect(';');
            }
        }
    }

    fn declare(
        &mut self,
        line: usize,
        storage: Option<Storage>,
        ty: &str,
        name: &str,
    ) -> Result<(), CompileError> {
        if ty == "void" {
            return Err(CompileError::new(
                line,
                format!("'{name}' : illegal use of type 'void'"),
            ));
        }

        let list = match (self.stage, storage) {
            (_, None | Some(Storage::Const)) => return Ok(()),
            (_, Some(Storage::Uniform)) => &mut self.interface.uniforms,
            (ShaderStage::Vertex, Some(Storage::In | Storage::Attribute)) => {
                &mut self.interface.inputs
            }
            (ShaderStage::Vertex, Some(Storage::Out | Storage::Varying)) => {
                &mut self.interface.outputs
            }
            (ShaderStage::Fragment, Some(Storage::In | Storage::Varying)) => {
                &mut self.interface.inputs
            }
            (ShaderStage::Fragment, Some(Storage::Out)) => &mut self.interface.outputs,
            (ShaderStage::Fragment, Some(Storage::Attribute)) => {
                return Err(CompileError::new(
                    line,
                    "'attribute' : supported in vertex shaders only",
                ))
            }
        };

        if list.iter().any(|variable| variable.name == name) {
            return Err(CompileError::new(
                line,
                format!("'{name}' : redefinition"),
            ));
        }

        list.push(Variable {
            name: name.to_owned(),
            ty: ty.to_owned(),
        });

        Ok(())
    }
}

/// Every statement in a block must be terminated before the block closes.
fn check_statements(block: &[Spanned]) -> Result<(), CompileError> {
    for pair in block.windows(2) {
        if pair[1].token != Token::Punct('}') {
            continue;
        }

        if !matches!(pair[0].token, Token::Punct(';' | '{' | '}')) {
            return Err(CompileError::new(
                pair[1].line,
                format!("syntax error, unexpected '}}' after {}", pair[0].token),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{DEFAULT_FRAGMENT_SHADER, DEFAULT_VERTEX_SHADER};

    fn var(name: &str, ty: &str) -> Variable {
        Variable {
            name: name.into(),
            ty: ty.into(),
        }
    }

    #[test]
    fn default_shaders_compile_and_link() {
        let vertex = compile(ShaderStage::Vertex, DEFAULT_VERTEX_SHADER).unwrap();
        let fragment = compile(ShaderStage::Fragment, DEFAULT_FRAGMENT_SHADER).unwrap();

        assert_eq!(vertex.inputs, [var("a_Position", "vec4")]);
        assert!(vertex.outputs.is_empty());
        assert_eq!(fragment.uniforms, [var("u_Color", "vec4")]);
        assert_eq!(fragment.outputs, [var("o_FragColor", "vec4")]);

        let linked = link(&vertex, &fragment).unwrap();
        assert_eq!(linked.attributes, [var("a_Position", "vec4")]);
        assert_eq!(linked.uniforms, [var("u_Color", "vec4")]);
    }

    #[test]
    fn legacy_qualifiers_and_directives() {
        let source = "#version 100\n\
            // comment\n\
            precision mediump float;\n\
            /* block\n comment */\n\
            attribute vec4 a_Position;\n\
            attribute vec2 a_Tex, a_Extra;\n\
            varying vec2 v_Tex;\n\
            const float SCALE = max(1.0, 2.0);\n\
            void main(void) {\n\
                if (SCALE > 1.0) { v_Tex = a_Tex; }\n\
                gl_Position = a_Position * 1.5e-1;\n\
            }\n";

        let interface = compile(ShaderStage::Vertex, source).unwrap();
        let names: Vec<_> = interface.inputs.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, ["a_Position", "a_Tex", "a_Extra"]);
        assert_eq!(interface.outputs, [var("v_Tex", "vec2")]);
    }

    #[test]
    fn missing_semicolon_reports_the_line() {
        let err = compile(
            ShaderStage::Vertex,
            "in vec4 p;\nvoid main() {\n  gl_Position = p\n}\n",
        )
        .unwrap_err();
        assert_eq!(err.line, 4);
        assert!(err.to_string().starts_with("ERROR: 0:4: syntax error"));
    }

    #[test]
    fn broken_sources_are_rejected() {
        let cases = [
            "",
            "void main() { gl_Position = vec4(1.0); ",
            "void main() { gl_Position = vec4(1.0)); }",
            "vec5 p; void main() {}",
            "void main() {} void main() {}",
            "int main() { return 0; }",
            "void main() { x = 1 @ 2; }",
            "uniform vec4 c; uniform vec4 c; void main() {}",
            "void main() {} /* unterminated",
        ];

        for source in cases {
            assert!(
                compile(ShaderStage::Vertex, source).is_err(),
                "compiled: {source:?}"
            );
        }
    }

    #[test]
    fn attribute_is_vertex_only() {
        let err = compile(
            ShaderStage::Fragment,
            "attribute vec4 a;\nvoid main() {}",
        )
        .unwrap_err();
        assert!(err.message.contains("vertex shaders only"));
    }

    #[test]
    fn link_checks_both_directions() {
        let vertex = compile(
            ShaderStage::Vertex,
            "out vec2 v_Tex; void main() { v_Tex = vec2(0.0); }",
        )
        .unwrap();
        let fragment = compile(ShaderStage::Fragment, "in vec3 v_Tex; void main() {}").unwrap();
        let log = link(&vertex, &fragment).unwrap_err();
        assert!(log.contains("vec2 in the vertex shader but vec3"));

        let fragment = compile(ShaderStage::Fragment, "void main() {}").unwrap();
        let log = link(&vertex, &fragment).unwrap_err();
        assert!(log.contains("`v_Tex` is not read"));

        let vertex = compile(ShaderStage::Vertex, "uniform float u; void main() {}").unwrap();
        let fragment =
            compile(ShaderStage::Fragment, "uniform vec4 u; void main() {}").unwrap();
        assert!(link(&vertex, &fragment).is_err());
    }
}
