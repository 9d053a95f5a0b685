//! Builds ordered pipelines of stages from a line already accepted by
//! [`crate::lexer::validate_syntax`].

use crate::lexer::{self, Token};

/// One command in a pipeline: its argument vector plus at most one input
/// and one output redirection.
#[derive(Debug, Clone)]
pub struct Stage {
    pub argv: Vec<String>,
    pub infile: Option<String>,
    pub outfile: Option<String>,
    pub append: bool,
}

impl Stage {
    fn new() -> Self {
        Stage {
            argv: Vec::new(),
            infile: None,
            outfile: None,
            append: false,
        }
    }

    pub fn program(&self) -> &str {
        self.argv.first().map(String::as_str).unwrap_or("")
    }
}

/// A `;`-delimited command group: one or more `|`-joined stages, optionally
/// launched in the background.
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stages: Vec<Stage>,
    pub background: bool,
    /// The original source text of this group, used for job-table display
    /// (`fg`/`bg`/`activities` echo the command as the user typed it).
    pub command_text: String,
}

/// Split an already-validated line into its `;`-separated command groups.
///
/// Panics only if called on a line that `validate_syntax` rejected — callers
/// must validate first, matching the data-flow spec.md prescribes.
pub fn build_pipelines(line: &str) -> Vec<Pipeline> {
    let tokens = lexer::tokenize(line);
    let mut groups: Vec<&[Token]> = Vec::new();
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if matches!(tok, Token::Semi) {
            groups.push(&tokens[start..i]);
            start = i + 1;
        }
    }
    groups.push(&tokens[start..]);

    let mut texts: Vec<&str> = Vec::new();
    let mut seg_start = 0;
    for (i, _) in line.match_indices(';') {
        texts.push(line[seg_start..i].trim());
        seg_start = i + 1;
    }
    texts.push(line[seg_start..].trim());

    groups
        .iter()
        .zip(texts.iter())
        .map(|(toks, text)| build_one_pipeline(toks, text))
        .collect()
}

fn build_one_pipeline(tokens: &[Token], command_text: &str) -> Pipeline {
    let background = matches!(tokens.last(), Some(Token::Amp));
    let tokens = if background {
        &tokens[..tokens.len() - 1]
    } else {
        tokens
    };

    let command_text = if background {
        command_text.trim_end_matches('&').trim()
    } else {
        command_text
    };

    let mut stages = Vec::new();
    let mut start = 0;
    for (i, tok) in tokens.iter().enumerate() {
        if matches!(tok, Token::Pipe) {
            stages.push(build_stage(&tokens[start..i]));
            start = i + 1;
        }
    }
    stages.push(build_stage(&tokens[start..]));

    Pipeline {
        stages,
        background,
        command_text: command_text.to_string(),
    }
}

fn build_stage(tokens: &[Token]) -> Stage {
    let mut stage = Stage::new();
    let mut i = 0;
    while i < tokens.len() {
        match &tokens[i] {
            Token::Name(name) => {
                stage.argv.push(name.clone());
                i += 1;
            }
            Token::Lt => {
                if let Some(Token::Name(name)) = tokens.get(i + 1) {
                    stage.infile = Some(name.clone());
                }
                i += 2;
            }
            Token::Gt => {
                if let Some(Token::Name(name)) = tokens.get(i + 1) {
                    stage.outfile = Some(name.clone());
                    stage.append = false;
                }
                i += 2;
            }
            Token::GtGt => {
                if let Some(Token::Name(name)) = tokens.get(i + 1) {
                    stage.outfile = Some(name.clone());
                    stage.append = true;
                }
                i += 2;
            }
            Token::Pipe | Token::Semi | Token::Amp => {
                // Unreachable for tokens produced from a validated line: '|'
                // is consumed by the caller's split, ';'/'&' never appear
                // inside a single command group's token slice.
                i += 1;
            }
        }
    }
    stage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_stage_no_redirection() {
        let pipelines = build_pipelines("echo hello world");
        assert_eq!(pipelines.len(), 1);
        let p = &pipelines[0];
        assert!(!p.background);
        assert_eq!(p.stages.len(), 1);
        assert_eq!(p.stages[0].argv, vec!["echo", "hello", "world"]);
        assert!(p.stages[0].infile.is_none());
        assert!(p.stages[0].outfile.is_none());
    }

    #[test]
    fn pipeline_of_two_stages() {
        let pipelines = build_pipelines("echo hi | wc -c");
        assert_eq!(pipelines.len(), 1);
        let p = &pipelines[0];
        assert_eq!(p.stages.len(), 2);
        assert_eq!(p.stages[0].argv, vec!["echo", "hi"]);
        assert_eq!(p.stages[1].argv, vec!["wc", "-c"]);
    }

    #[test]
    fn sequential_groups() {
        let pipelines = build_pipelines("echo a ; echo b");
        assert_eq!(pipelines.len(), 2);
        assert_eq!(pipelines[0].stages[0].argv, vec!["echo", "a"]);
        assert_eq!(pipelines[1].stages[0].argv, vec!["echo", "b"]);
    }

    #[test]
    fn background_marker_is_stripped() {
        let pipelines = build_pipelines("sleep 100 &");
        assert!(pipelines[0].background);
        assert_eq!(pipelines[0].stages[0].argv, vec!["sleep", "100"]);
    }

    #[test]
    fn redirections_are_captured() {
        let pipelines = build_pipelines("sort < in.txt > out.txt");
        let stage = &pipelines[0].stages[0];
        assert_eq!(stage.argv, vec!["sort"]);
        assert_eq!(stage.infile.as_deref(), Some("in.txt"));
        assert_eq!(stage.outfile.as_deref(), Some("out.txt"));
        assert!(!stage.append);
    }

    #[test]
    fn append_redirection_sets_flag() {
        let pipelines = build_pipelines("wc -l >> out.txt");
        let stage = &pipelines[0].stages[0];
        assert_eq!(stage.outfile.as_deref(), Some("out.txt"));
        assert!(stage.append);
    }

    #[test]
    fn command_text_preserved_for_job_table() {
        let pipelines = build_pipelines("sleep 100 &");
        assert_eq!(pipelines[0].command_text, "sleep 100");
    }
}
