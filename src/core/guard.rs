//! Pre-tool policy gate for destructive `rm` invocations.
//!
//! This is pattern matching over shell words, not a shell interpreter:
//! variables, globs and subshells are not expanded. Every word of every
//! segment is checked, so `rm` is caught behind wrappers such as `sudo -u`,
//! `xargs`, `env` or `time`, and inside `sh -c '...'` strings.
//!
//! The command word is compared case-insensitively (`RM` runs `rm` on
//! case-insensitive filesystems). Flags and paths are compared as the shell
//! passes them: `-R` is recursive but `-F` is not force, and `$home` is not
//! `$HOME`.

use regex::Regex;

/// `;`, `&`, `&&`, `||`, `|`, newlines, parentheses and backticks start a
/// new command.
const SEGMENT_SEPARATORS: &str = r"&&|\|\||[;|&\n()`]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block { reason: String },
}

impl Verdict {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Verdict::Block { .. })
    }
}

/// Flags and operands of one `rm` invocation.
#[derive(Debug, Default, PartialEq, Eq)]
struct RmInvocation {
    recursive: bool,
    force: bool,
    paths: Vec<String>,
}

fn split_segments(command: &str) -> Vec<&str> {
    match Regex::new(SEGMENT_SEPARATORS) {
        Ok(re) => re.split(command).collect(),
        Err(_) => command.lines().collect(),
    }
}

fn tokenize(segment: &str) -> Vec<String> {
    // Unbalanced quotes: fall back to plain whitespace splitting
    shlex::split(segment)
        .unwrap_or_else(|| segment.split_whitespace().map(String::from).collect())
}

fn is_rm(word: &str) -> bool {
    word.trim_start_matches(['{', '!'])
        .rsplit('/')
        .next()
        .is_some_and(|name| name.eq_ignore_ascii_case("rm"))
}

/// `-c`, `-lc`, `-ec`: the next word is a command string for a shell.
fn is_command_string_flag(word: &str) -> bool {
    word.len() > 1
        && word.starts_with('-')
        && !word.starts_with("--")
        && word.ends_with('c')
}

fn is_redirect(word: &str) -> bool {
    word.contains('>') || word.starts_with('<')
}

/// Flags and operands following an `rm` word.
fn parse_rm_args<'a>(args: impl Iterator<Item = &'a str>) -> RmInvocation {
    let mut rm = RmInvocation::default();
    let mut only_paths = false;
    let mut skip_redirect_target = false;
    for word in args {
        if skip_redirect_target {
            skip_redirect_target = false;
            continue;
        }
        if is_redirect(word) {
            // `2> log` names the target separately, `2>log` does not
            skip_redirect_target = word.ends_with('>') || word.ends_with('<');
            continue;
        }
        if only_paths || !word.starts_with('-') || word == "-" {
            rm.paths.push(word.to_string());
            continue;
        }
        match word {
            "--" => only_paths = true,
            "--recursive" => rm.recursive = true,
            "--force" => rm.force = true,
            long if long.starts_with("--") => {}
            short => {
                for c in short.chars().skip(1) {
                    match c {
                        'r' | 'R' => rm.recursive = true,
                        'f' => rm.force = true,
                        _ => {}
                    }
                }
            }
        }
    }
    rm
}

/// Every `rm` call in one segment, wherever it appears, plus the shell
/// command strings passed with `-c`.
fn find_rm_calls(segment: &str) -> (Vec<RmInvocation>, Vec<String>) {
    let tokens = tokenize(segment);
    let mut calls = Vec::new();
    let mut nested = Vec::new();
    for (i, word) in tokens.iter().enumerate() {
        if is_rm(word) {
            calls.push(parse_rm_args(tokens[i + 1..].iter().map(String::as_str)));
        } else if is_command_string_flag(word) {
            if let Some(script) = tokens.get(i + 1) {
                nested.push(script.clone());
            }
        }
    }
    (calls, nested)
}

fn has_parent_component(path: &str) -> bool {
    path.split('/').any(|part| part == "..")
}

/// Targets that are never safe to delete recursively.
fn is_dangerous_path(path: &str) -> bool {
    matches!(path, "/" | "/*" | "." | "./")
        || path.starts_with('~')
        || path.starts_with("$HOME")
        || path.starts_with("${HOME}")
        || path.contains('*')
        || has_parent_component(path)
}

/// `path` lies strictly inside one of `allowed_dirs`.
fn is_allowed_path(path: &str, allowed_dirs: &[String]) -> bool {
    if has_parent_component(path) {
        return false;
    }
    let path = path.strip_prefix("./").unwrap_or(path);
    allowed_dirs.iter().any(|dir| {
        let dir = dir.strip_prefix("./").unwrap_or(dir).trim_end_matches('/');
        !dir.is_empty()
            && path
                .strip_prefix(dir)
                .and_then(|rest| rest.strip_prefix('/'))
                .is_some_and(|rest| !rest.is_empty())
    })
}

impl RmInvocation {
    fn is_dangerous(&self) -> bool {
        self.recursive && (self.force || self.paths.iter().any(|p| is_dangerous_path(p)))
    }

    fn is_confined_to(&self, allowed_dirs: &[String]) -> bool {
        !self.paths.is_empty() && self.paths.iter().all(|p| is_allowed_path(p, allowed_dirs))
    }
}

/// Decide whether a shell command may run.
pub fn check_command(command: &str, allowed_dirs: &[String]) -> Verdict {
    for segment in split_segments(command) {
        let (calls, nested) = find_rm_calls(segment);
        if let Some(rm) = calls
            .iter()
            .find(|rm| rm.is_dangerous() && !rm.is_confined_to(allowed_dirs))
        {
            tracing::debug!("blocking rm invocation: {:?}", rm);
            return Verdict::Block {
                reason: "Dangerous rm command detected and prevented".to_string(),
            };
        }
        for script in nested.iter().filter(|script| script.as_str() != segment) {
            let verdict = check_command(script, allowed_dirs);
            if verdict.is_blocked() {
                return verdict;
            }
        }
    }
    Verdict::Allow
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowed() -> Vec<String> {
        vec!["trees/".to_string()]
    }

    fn blocked(command: &str) -> bool {
        check_command(command, &allowed()).is_blocked()
    }

    #[test]
    fn test_allowed_directory_is_not_blocked() {
        assert!(!blocked("rm -rf ./trees/foo"));
        assert!(!blocked("rm -rf trees/foo trees/bar"));
        assert!(!blocked("rm -rf \"trees/my worktree\""));
    }

    #[test]
    fn test_dangerous_targets_are_blocked() {
        assert!(blocked("rm -rf /"));
        assert!(blocked("rm -rf ~/Documents"));
        assert!(blocked("rm -rf $HOME"));
        assert!(blocked("rm -rf /*"));
    }

    #[test]
    fn test_parent_reference_escapes_allow_list() {
        assert!(blocked("rm -rf ./trees/../etc"));
        assert!(blocked("rm -rf trees/../../x"));
    }

    #[test]
    fn test_flag_spellings() {
        for cmd in [
            "rm -rf build",
            "rm -fr build",
            "rm -Rf build",
            "rm -r -f build",
            "rm -f -r build",
            "rm --recursive --force build",
            "rm --force --recursive build",
            "rm -r build -f",
        ] {
            assert!(blocked(cmd), "{} should be blocked", cmd);
        }
    }

    #[test]
    fn test_recursive_without_force_depends_on_target() {
        assert!(!blocked("rm -r build"));
        assert!(blocked("rm -r ."));
        assert!(blocked("rm -r *"));
        assert!(blocked("rm -r ../sibling"));
    }

    #[test]
    fn test_plain_rm_is_allowed() {
        assert!(!blocked("rm file.txt"));
        assert!(!blocked("rm -f file.txt"));
        assert!(!blocked("rm -r"));
    }

    #[test]
    fn test_forced_recursive_without_paths_is_blocked() {
        assert!(blocked("rm -rf"));
    }

    #[test]
    fn test_mixed_paths_are_blocked() {
        assert!(blocked("rm -rf trees/a /etc"));
        // The allowed directory itself is not inside it
        assert!(blocked("rm -rf trees"));
    }

    #[test]
    fn test_compound_commands() {
        assert!(blocked("cd /tmp && rm -rf build"));
        assert!(blocked("echo ok; sudo rm -rf /var/lib"));
        assert!(blocked("true || FOO=1 /bin/rm -rf data"));
        assert!(blocked("ls\nrm -rf src"));
        assert!(!blocked("ls | grep rm"));
        assert!(!blocked("git rm -r --cached foo"));
        assert!(blocked("sleep 1 & rm -rf /"));
        assert!(blocked("if true; then rm -rf /; fi"));
        assert!(blocked("(rm -rf ~)"));
        assert!(blocked("echo $(rm -rf ~)"));
        assert!(blocked("echo `rm -rf /`"));
        assert!(blocked("{ rm -rf /; }"));
    }

    #[test]
    fn test_wrapped_rm_is_found() {
        for cmd in [
            "sudo -u root rm -rf /",
            "time rm -rf /",
            "nohup rm -rf ~",
            "env rm -rf /",
            "env FOO=1 rm -rf build",
            "find . | xargs rm -rf",
            "find . -name '*.tmp' -exec rm -rf {} +",
        ] {
            assert!(blocked(cmd), "{} should be blocked", cmd);
        }
        assert!(!blocked("sudo -u root rm -rf trees/old"));
        assert!(!blocked("xargs rm -f < list.txt"));
    }

    #[test]
    fn test_shell_command_strings_are_checked() {
        assert!(blocked("bash -c 'rm -rf /'"));
        assert!(blocked("sh -lc \"cd /tmp && rm -rf build\""));
        assert!(blocked("bash -c \"bash -c 'rm -rf ~'\""));
        assert!(!blocked("bash -c 'rm -rf trees/old'"));
        assert!(!blocked("bash -c 'ls -la'"));
    }

    #[test]
    fn test_redirects_are_not_paths() {
        assert!(!blocked("rm -rf trees/old 2>/dev/null"));
        assert!(!blocked("rm -rf trees/old 2> /dev/null"));
        assert!(blocked("rm -rf build > /dev/null 2>&1"));
    }

    #[test]
    fn test_command_word_ignores_case() {
        assert!(blocked("RM -rf /"));
        assert!(blocked("/bin/Rm -rf build"));
        // Flags keep their meaning: -F is not force
        assert!(!blocked("rm -RF build"));
        assert!(blocked("rm -RF /"));
    }

    #[test]
    fn test_double_dash_ends_flags() {
        assert!(blocked("rm -r -- -weird-dir/*"));
        assert!(!blocked("rm -r -- -f"));
    }

    #[test]
    fn test_empty_allow_list() {
        assert!(check_command("rm -rf ./trees/foo", &[]).is_blocked());
        assert!(!check_command("cargo build", &[]).is_blocked());
    }
}
