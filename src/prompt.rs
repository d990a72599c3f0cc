use std::io::{self, Write};

pub struct Prompt {
    prefix: Option<String>,
}

impl Prompt {
    pub fn new() -> Self {
        Self {
            prefix: Some(String::from(": ")),
        }
    }

    /// A prompt that prints nothing, for scripted input.
    pub fn silent() -> Self {
        Self { prefix: None }
    }

    pub fn get_string(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    pub fn display(&self) {
        let prefix = self.get_string();
        if prefix.is_empty() {
            return;
        }
        let mut stdout = io::stdout();
        let _ = stdout.write_all(prefix.as_bytes());
        let _ = stdout.flush();
    }
}
