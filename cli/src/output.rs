//! Output utilities for the pcmix CLI.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use serde::Serialize;

/// Output format for reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// YAML format (default).
    #[default]
    Yaml,
    /// JSON format.
    Json,
}

/// Where and how reports are printed.
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    /// Creates a new output configuration.
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Renders `value` in the configured format.
    pub fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
        })
    }

    /// Prints a report to stdout.
    pub fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", self.render(value)?);
        Ok(())
    }
}

/// Opens the PCM sink: a file, or stdout when `path` is `-`.
pub fn pcm_writer(path: &str) -> io::Result<Box<dyn Write + Send>> {
    if path == "-" {
        return Ok(Box::new(io::stdout()));
    }
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(Box::new(io::BufWriter::new(File::create(path)?)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_render() {
        let value = BTreeMap::from([("frames", 10)]);
        let yaml = Output::new(OutputFormat::Yaml).render(&value).unwrap();
        assert_eq!(yaml.trim(), "frames: 10");
        let json = Output::new(OutputFormat::Json).render(&value).unwrap();
        assert!(json.contains("\"frames\": 10"));
    }

    #[test]
    fn test_pcm_writer_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("mix.pcm");
        {
            let mut w = pcm_writer(path.to_str().unwrap()).unwrap();
            w.write_all(&[1, 2]).unwrap();
            w.flush().unwrap();
        }
        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2]);
    }
}
