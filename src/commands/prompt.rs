//! 基于行输入的终端交互

use crate::core::{Notice, Prompter};
use std::io::{self, BufRead, Stdin, Stdout, Write};
use std::path::PathBuf;

/// 读取行输入、写出编号菜单的 [`Prompter`]
///
/// 输入结束（EOF）等同于取消。
pub struct TerminalPrompter<R, W> {
    input: R,
    output: W,
    /// 密码输入是否关闭回显（仅对真实终端有效）
    hide_secrets: bool,
}

impl TerminalPrompter<io::StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        let stdin: Stdin = io::stdin();
        Self {
            input: stdin.lock(),
            output: io::stdout(),
            hide_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> TerminalPrompter<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hide_secrets: false,
        }
    }

    pub fn into_output(self) -> W {
        self.output
    }

    fn say(&mut self, line: &str) {
        let _ = writeln!(self.output, "{}", line);
    }

    fn ask(&mut self, message: &str) -> Option<String> {
        let _ = write!(self.output, "{} ", message);
        let _ = self.output.flush();
        let mut line = String::new();
        match self.input.read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line.trim_end_matches(['\r', '\n']).to_string()),
        }
    }
}

impl<R: BufRead, W: Write> Prompter for TerminalPrompter<R, W> {
    fn select(&mut self, message: &str, options: &[String]) -> Option<usize> {
        if options.is_empty() {
            return None;
        }
        self.say("");
        self.say(message);
        for (index, option) in options.iter().enumerate() {
            self.say(&format!("  {:>2}) {}", index + 1, option));
        }
        loop {
            let answer = self.ask(&format!("请选择 [1-{}]:", options.len()))?;
            match answer.trim().parse::<usize>() {
                Ok(n) if (1..=options.len()).contains(&n) => return Some(n - 1),
                _ => self.say("无效的选择"),
            }
        }
    }

    fn text(
        &mut self,
        message: &str,
        validate: &dyn Fn(&str) -> Result<(), String>,
    ) -> Option<String> {
        loop {
            let answer = self.ask(&format!("{}:", message))?;
            let answer = answer.trim();
            if answer.is_empty() {
                return None;
            }
            match validate(answer) {
                Ok(()) => return Some(answer.to_string()),
                Err(hint) => self.say(&hint),
            }
        }
    }

    fn secret(&mut self, message: &str) -> Option<String> {
        if self.hide_secrets {
            rpassword::prompt_password(format!("{}: ", message))
                .ok()
                .filter(|p| !p.is_empty())
        } else {
            self.text(message, &|_| Ok(()))
        }
    }

    fn confirm(&mut self, message: &str) -> bool {
        self.ask(&format!("{} [y/N]", message))
            .map(|a| matches!(a.trim().to_lowercase().as_str(), "y" | "yes" | "j" | "ja"))
            .unwrap_or(false)
    }

    fn choose_local_file(&mut self) -> Option<PathBuf> {
        self.text("本地文件路径", &|value| {
            if PathBuf::from(value).is_file() {
                Ok(())
            } else {
                Err("文件不存在".to_string())
            }
        })
        .map(PathBuf::from)
    }

    fn notify(&mut self, notice: Notice) {
        let line = match notice {
            Notice::Info(message) => format!("[信息] {}", message),
            Notice::Success(message) => format!("[成功] {}", message),
            Notice::Warning(message) => format!("[警告] {}", message),
            Notice::Error { kind, message } => format!("[错误:{:?}] {}", kind, message),
        };
        self.say(&line);
    }
}
