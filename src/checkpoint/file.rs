use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use log::info;

use crate::checkpoint::codec;
use crate::checkpoint::format::CheckpointFormat;
use crate::checkpoint::options::CodecOptions;
use crate::checkpoint::Checkpoint;
use crate::error::{CheckpointError, Result};

/// Writes `checkpoint` to `path` with default options. The format follows the
/// extension: `.json` is JSON, anything else is binary.
pub fn save<P: AsRef<Path>>(path: P, checkpoint: &Checkpoint) -> Result<()> {
    save_with(path, checkpoint, &CodecOptions::default())
}

/// Writes `checkpoint` to `path`, replacing any existing file.
///
/// With `atomic_write` the artifact is written to a temporary file in the same
/// directory and renamed over `path` only once complete; a failure part way
/// leaves the destination as it was.
pub fn save_with<P: AsRef<Path>>(path: P, checkpoint: &Checkpoint, options: &CodecOptions) -> Result<()> {
    let path = path.as_ref();
    let format = CheckpointFormat::from_path(path);
    // JSON is rendered before any file is opened so a refused checkpoint
    // leaves the destination alone even without atomic writes.
    let rendered = match format {
        CheckpointFormat::Json => Some(codec::encode_json(checkpoint)?),
        CheckpointFormat::Binary => None,
    };

    if options.atomic_write {
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".ferrite-checkpoint-")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            write_artifact(&mut writer, checkpoint, rendered.as_deref())?;
            writer.flush()?;
        }
        if options.sync {
            tmp.as_file().sync_all()?;
        }
        tmp.persist(path).map_err(|e| CheckpointError::Io(e.error))?;
    } else {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write_artifact(&mut writer, checkpoint, rendered.as_deref())?;
        writer.flush()?;
        if options.sync {
            writer.get_ref().sync_all()?;
        }
    }

    info!(
        "saved {:?} checkpoint to {} ({} parameters)",
        format,
        path.display(),
        checkpoint.parameters.element_count()
    );
    Ok(())
}

fn write_artifact<W: Write>(writer: &mut W, checkpoint: &Checkpoint, rendered: Option<&[u8]>) -> Result<()> {
    match rendered {
        Some(bytes) => {
            writer.write_all(bytes)?;
            Ok(())
        }
        None => codec::encode_to(writer, &checkpoint.architecture, &checkpoint.parameters),
    }
}

/// Reads a checkpoint file with default options.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Checkpoint> {
    load_with(path, &CodecOptions::default())
}

/// Reads a checkpoint file. Missing or unreadable files are `Io` errors;
/// files that are not valid artifacts are `CorruptArtifact`.
pub fn load_with<P: AsRef<Path>>(path: P, options: &CodecOptions) -> Result<Checkpoint> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);

    let checkpoint = match CheckpointFormat::from_path(path) {
        CheckpointFormat::Binary => codec::decode_from(&mut reader, options)?,
        CheckpointFormat::Json => {
            let mut bytes = Vec::new();
            reader.read_to_end(&mut bytes)?;
            codec::decode_json(&bytes)?
        }
    };

    info!(
        "loaded checkpoint from {} ({} tensors)",
        path.display(),
        checkpoint.parameters.len()
    );
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::tensor::Tensor;
    use crate::network::architecture::ArchitectureDescriptor;
    use crate::network::params::ParameterSet;

    fn sample() -> Checkpoint {
        let mut params = ParameterSet::new();
        params.insert("output.weight", Tensor::from_vec(vec![1, 2], vec![0.5, -0.5]).unwrap());
        params.insert("output.bias", Tensor::from_vec(vec![1], vec![2.0]).unwrap());
        Checkpoint::new(ArchitectureDescriptor::new(2, 1, vec![]), params)
    }

    fn file_names(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect()
    }

    fn with_nan() -> Checkpoint {
        let mut c = sample();
        c.parameters.insert("output.weight", Tensor::from_vec(vec![1, 2], vec![f32::NAN, 1.0]).unwrap());
        c
    }

    #[test]
    fn atomic_save_leaves_no_temporaries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.fnnc");
        save(&path, &sample()).unwrap();
        save(&path, &sample()).unwrap();

        assert_eq!(file_names(dir.path()), vec!["model.fnnc".to_string()]);
        assert_eq!(load(&path).unwrap(), sample());
    }

    #[test]
    fn refused_json_save_keeps_previous_artifact() {
        for options in [CodecOptions::default(), CodecOptions::default().atomic_write(false)] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("model.json");
            save_with(&path, &sample(), &options).unwrap();
            let before = std::fs::read(&path).unwrap();

            let err = save_with(&path, &with_nan(), &options).unwrap_err();
            assert!(matches!(err, CheckpointError::NonFiniteValue { .. }), "{err}");

            assert_eq!(std::fs::read(&path).unwrap(), before);
            assert_eq!(load(&path).unwrap(), sample());
            assert_eq!(file_names(dir.path()), vec!["model.json".to_string()]);
        }
    }

    #[test]
    fn non_finite_values_survive_binary_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.fnnc");
        save(&path, &with_nan()).unwrap();
        let back = load(&path).unwrap();
        assert!(back.parameters.get("output.weight").unwrap().data()[0].is_nan());
    }

    #[test]
    fn plain_save_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.bin");
        let options = CodecOptions::default().atomic_write(false).sync(false);
        save_with(&path, &sample(), &options).unwrap();
        assert_eq!(load_with(&path, &options).unwrap(), sample());
    }

    #[test]
    fn json_extension_selects_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        save(&path, &sample()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_start().starts_with('{'));
        assert_eq!(load(&path).unwrap(), sample());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(dir.path().join("absent.fnnc")).unwrap_err();
        assert!(matches!(err, CheckpointError::Io(_)));
    }

    #[test]
    fn missing_directory_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = save(dir.path().join("no/such/dir/model.fnnc"), &sample()).unwrap_err();
        assert!(matches!(err, CheckpointError::Io(_)));
    }
}
