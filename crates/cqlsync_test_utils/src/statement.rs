//! Minimal reader for the statement shapes the controllers emit.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateKeyspace {
        name: String,
        replication: BTreeMap<String, String>,
        durable_writes: Option<bool>,
    },
    DropKeyspace {
        name: String,
    },
    CreateRole {
        name: String,
        superuser: bool,
        login: bool,
        password: String,
    },
    AlterRole {
        name: String,
        superuser: bool,
        login: bool,
    },
    DropRole {
        name: String,
    },
    Grant {
        permission: String,
        keyspace: String,
        role: String,
    },
    Revoke {
        permission: String,
        keyspace: String,
        role: String,
    },
}

pub(crate) fn parse(statement: &str) -> Result<Statement, String> {
    let mut r = Reader::new(statement);
    let verb = r.word()?;
    let parsed = match verb.as_str() {
        "CREATE" => match r.word()?.as_str() {
            "KEYSPACE" => {
                r.keywords(&["IF", "NOT", "EXISTS"])?;
                let name = r.identifier()?;
                r.keywords(&["WITH", "REPLICATION"])?;
                r.symbol('=')?;
                let replication = r.map_literal()?;
                let durable_writes = if r.at_end() {
                    None
                } else {
                    r.keywords(&["AND", "DURABLE_WRITES"])?;
                    r.symbol('=')?;
                    Some(r.boolean()?)
                };
                Statement::CreateKeyspace {
                    name,
                    replication,
                    durable_writes,
                }
            }
            "ROLE" => {
                r.keywords(&["IF", "NOT", "EXISTS"])?;
                let name = r.identifier()?;
                r.keywords(&["WITH", "SUPERUSER"])?;
                r.symbol('=')?;
                let superuser = r.boolean()?;
                r.keywords(&["AND", "LOGIN"])?;
                r.symbol('=')?;
                let login = r.boolean()?;
                r.keywords(&["AND", "PASSWORD"])?;
                r.symbol('=')?;
                let password = r.string_literal()?;
                Statement::CreateRole {
                    name,
                    superuser,
                    login,
                    password,
                }
            }
            other => return Err(format!("unsupported CREATE {}", other)),
        },
        "DROP" => match r.word()?.as_str() {
            "KEYSPACE" => {
                r.keywords(&["IF", "EXISTS"])?;
                Statement::DropKeyspace {
                    name: r.identifier()?,
                }
            }
            "ROLE" => {
                r.keywords(&["IF", "EXISTS"])?;
                Statement::DropRole {
                    name: r.identifier()?,
                }
            }
            other => return Err(format!("unsupported DROP {}", other)),
        },
        "ALTER" => {
            r.keywords(&["ROLE"])?;
            let name = r.identifier()?;
            r.keywords(&["WITH", "SUPERUSER"])?;
            r.symbol('=')?;
            let superuser = r.boolean()?;
            r.keywords(&["AND", "LOGIN"])?;
            r.symbol('=')?;
            let login = r.boolean()?;
            Statement::AlterRole {
                name,
                superuser,
                login,
            }
        }
        "GRANT" | "REVOKE" => {
            let permission = r.words_until("ON")?;
            r.keywords(&["KEYSPACE"])?;
            let keyspace = r.identifier()?;
            r.keywords(&[if verb == "GRANT" { "TO" } else { "FROM" }])?;
            let role = r.identifier()?;
            if verb == "GRANT" {
                Statement::Grant {
                    permission,
                    keyspace,
                    role,
                }
            } else {
                Statement::Revoke {
                    permission,
                    keyspace,
                    role,
                }
            }
        }
        other => return Err(format!("unsupported statement {}", other)),
    };
    if !r.at_end() {
        return Err(format!("trailing input: {}", r.rest()));
    }
    Ok(parsed)
}

struct Reader<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn at_end(&mut self) -> bool {
        self.skip_ws();
        self.rest().is_empty()
    }

    fn peek(&mut self) -> Option<char> {
        self.skip_ws();
        self.rest().chars().next()
    }

    fn word(&mut self) -> Result<String, String> {
        self.skip_ws();
        let len = self
            .rest()
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
            .unwrap_or(self.rest().len());
        if len == 0 {
            return Err(format!("expected word at: {}", self.rest()));
        }
        let word = self.rest()[..len].to_ascii_uppercase();
        self.pos += len;
        Ok(word)
    }

    fn keywords(&mut self, expected: &[&str]) -> Result<(), String> {
        for keyword in expected {
            let word = self.word()?;
            if word != *keyword {
                return Err(format!("expected {} but found {}", keyword, word));
            }
        }
        Ok(())
    }

    fn words_until(&mut self, stop: &str) -> Result<String, String> {
        let mut words = Vec::new();
        loop {
            let word = self.word()?;
            if word == stop {
                break;
            }
            words.push(word);
        }
        if words.is_empty() {
            return Err(format!("expected words before {}", stop));
        }
        Ok(words.join(" "))
    }

    fn symbol(&mut self, expected: char) -> Result<(), String> {
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += c.len_utf8();
                Ok(())
            }
            _ => Err(format!("expected '{}' at: {}", expected, self.rest())),
        }
    }

    fn boolean(&mut self) -> Result<bool, String> {
        match self.word()?.as_str() {
            "TRUE" => Ok(true),
            "FALSE" => Ok(false),
            other => Err(format!("expected boolean, found {}", other)),
        }
    }

    /// Quoted identifiers keep their case; bare ones fold to lower case.
    fn identifier(&mut self) -> Result<String, String> {
        if self.peek() == Some('"') {
            return self.delimited('"');
        }
        self.word().map(|w| w.to_ascii_lowercase())
    }

    fn string_literal(&mut self) -> Result<String, String> {
        if self.peek() != Some('\'') {
            return Err(format!("expected string literal at: {}", self.rest()));
        }
        self.delimited('\'')
    }

    fn delimited(&mut self, quote: char) -> Result<String, String> {
        self.pos += quote.len_utf8();
        let mut out = String::new();
        let mut chars = self.rest().char_indices().peekable();
        while let Some((idx, ch)) = chars.next() {
            if ch == quote {
                if matches!(chars.peek(), Some((_, c)) if *c == quote) {
                    chars.next();
                    out.push(quote);
                    continue;
                }
                self.pos += idx + ch.len_utf8();
                return Ok(out);
            }
            out.push(ch);
        }
        Err("unterminated quoted text".to_string())
    }

    fn map_literal(&mut self) -> Result<BTreeMap<String, String>, String> {
        self.symbol('{')?;
        let mut map = BTreeMap::new();
        loop {
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(map);
            }
            let key = self.string_literal()?;
            self.symbol(':')?;
            let value = if self.peek() == Some('\'') {
                self.string_literal()?
            } else {
                self.word()?
            };
            map.insert(key, value);
            if self.peek() == Some(',') {
                self.pos += 1;
            }
        }
    }
}
