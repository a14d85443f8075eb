use std::process::Command;

/// Runs `prog` and returns its stdout, failing on spawn errors and non-zero exit codes.
pub fn make_call(name: &str, prog: &str, args: &[&str]) -> Result<String, String> {
    let output = match Command::new(prog).args(args).output() {
        Ok(output) => output,
        Err(err) => return Err(format!("command {} failed: {}", name, err)),
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    log_call_output(&stdout);

    if !output.status.success() {
        return Err(format!(
            "command {} exited with {}: {}",
            name,
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        ));
    }

    Ok(stdout)
}

fn log_call_output(output: &str) {
    log::trace!("\"\"\"{}\"\"\"", output);
}

#[cfg(test)]
mod tests {
    use super::make_call;

    #[test]
    fn returns_stdout() {
        assert_eq!(make_call("echo", "echo", &["hi"]).unwrap(), "hi\n");
    }

    #[test]
    fn missing_program_is_an_error() {
        let err = make_call("ghost", "definitely-not-a-real-program-xyz", &[]).unwrap_err();
        assert!(err.contains("ghost"));
    }

    #[test]
    fn failing_program_is_an_error() {
        assert!(make_call("false", "false", &[]).is_err());
    }
}
