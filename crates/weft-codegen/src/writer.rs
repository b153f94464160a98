/// Line-oriented text builder with four-space indentation.
#[derive(Debug, Default)]
pub(crate) struct CodeWriter {
    output: String,
    indent: usize,
}

impl CodeWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line(&mut self, text: impl AsRef<str>) {
        let text = text.as_ref();
        if !text.is_empty() {
            for _ in 0..self.indent {
                self.output.push_str("    ");
            }
            self.output.push_str(text);
        }
        self.output.push('\n');
    }

    pub fn blank(&mut self) {
        if !self.output.is_empty() && !self.output.ends_with("\n\n") {
            self.output.push('\n');
        }
    }

    /// Writes `header` and indents everything up to the matching `close`.
    pub fn open(&mut self, header: impl AsRef<str>) {
        self.line(header);
        self.indent += 1;
    }

    pub fn close(&mut self, footer: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(footer);
    }

    /// `} else {` and friends: one line at the enclosing level, then back inside.
    pub fn middle(&mut self, text: impl AsRef<str>) {
        self.indent = self.indent.saturating_sub(1);
        self.line(text);
        self.indent += 1;
    }

    pub fn finish(self) -> String {
        self.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use expect_test::expect;

    #[test]
    fn nests_blocks() {
        let mut w = CodeWriter::new();
        w.open("struct A {");
        w.line("int x;");
        w.open("if (a) {");
        w.line("");
        w.middle("} else {");
        w.line("b();");
        w.close("}");
        w.close("};");
        w.blank();
        w.blank();
        w.line("done");
        expect![[r#"
            struct A {
                int x;
                if (a) {

                } else {
                    b();
                }
            };

            done
        "#]]
        .assert_eq(&w.finish());
    }
}
