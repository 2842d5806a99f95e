//! `anno3d-inspect`: parse an annotation file against a label set and
//! report how many elements each label holds.
//!
//! ```text
//! anno3d-inspect <annotation-file> <labels.json>
//! ```

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    use anno3d::config::AnnotatorConfig;

    let config = AnnotatorConfig::load_from_default_path().unwrap_or_default();
    env_logger::Builder::new()
        .filter_level(config.log_level.to_level_filter())
        .parse_default_env()
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let [annotation_path, labels_path] = args.as_slice() else {
        eprintln!("usage: anno3d-inspect <annotation-file> <labels.json>");
        std::process::exit(2);
    };

    if let Err(e) = inspect::run(annotation_path, labels_path, &config) {
        log::error!("{}", e);
        eprintln!("{}: {}", e.code(), e);
        std::process::exit(1);
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod inspect {
    use std::fs::File;
    use std::path::Path;

    use anno3d::annotation::AnnotationError;
    use anno3d::config::AnnotatorConfig;
    use anno3d::format::{FormatError, GenericAnnotationFileParser};
    use anno3d::model::labels_from_json;

    #[derive(Debug, thiserror::Error)]
    pub enum InspectError {
        #[error("Failed to read {path}: {source}")]
        Io {
            path: String,
            source: std::io::Error,
        },

        #[error(transparent)]
        Labels(#[from] AnnotationError),

        #[error(transparent)]
        Format(#[from] FormatError),
    }

    impl InspectError {
        pub fn code(&self) -> &'static str {
            match self {
                Self::Io { .. } => "IO",
                Self::Labels(_) => "LABELS",
                Self::Format(e) => e.code(),
            }
        }
    }

    pub fn run(annotation_path: &str, labels_path: &str, config: &AnnotatorConfig) -> Result<(), InspectError> {
        let labels_json = std::fs::read_to_string(labels_path).map_err(|source| InspectError::Io {
            path: labels_path.to_string(),
            source,
        })?;
        let labels = labels_from_json(&labels_json)?;
        log::debug!("Loaded {} labels from {}", labels.len(), labels_path);

        let file = File::open(Path::new(annotation_path)).map_err(|source| InspectError::Io {
            path: annotation_path.to_string(),
            source,
        })?;
        let parsed = GenericAnnotationFileParser::new(&labels)
            .with_chunk_size(config.io.read_chunk_size)
            .parse(file)?;

        println!("{}: {} elements", annotation_path, parsed.count);
        let mut labeled = 0;
        for selection in &parsed.selections {
            let label = &selection.label;
            labeled += selection.len();
            log::info!("{} ({}): {}", label.name, label.class_code(), selection.len());
            println!(
                "  {:>5}  {:<24} {:>10}",
                label.class_code(),
                label.name,
                selection.len()
            );
        }
        println!("  {:>5}  {:<24} {:>10}", "", "unlabeled", parsed.count.saturating_sub(labeled));
        Ok(())
    }
}

// WASM builds only use the library
#[cfg(target_arch = "wasm32")]
fn main() {}
