//! Сохранение и загрузка обученных объектов

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, HousingError, Result, ResultExt};

/// Версия формата артефактов; несовпадение при загрузке фатально
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    FeaturesPreprocessor,
    Preprocessor,
    Model,
}

#[derive(Serialize)]
struct EnvelopeRef<'a, T> {
    format_version: u32,
    kind: ArtifactKind,
    payload: &'a T,
}

#[derive(Deserialize)]
struct Envelope {
    format_version: u32,
    kind: ArtifactKind,
    payload: serde_json::Value,
}

/// Сериализация в память: запись на диск происходит только после успешного кодирования всех артефактов
pub fn encode<T: Serialize>(kind: ArtifactKind, payload: &T) -> Result<String> {
    let envelope = EnvelopeRef {
        format_version: FORMAT_VERSION,
        kind,
        payload,
    };
    serde_json::to_string_pretty(&envelope)
        .wrap_err_with(ErrorKind::Artifact, || format!("cannot serialize {:?} artifact", kind))
}

pub fn write_encoded(path: &Path, encoded: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .wrap_err_with(ErrorKind::Artifact, || format!("cannot create {}", parent.display()))?;
    }
    std::fs::write(path, encoded).wrap_err_with(ErrorKind::Artifact, || format!("cannot write {}", path.display()))
}

/// Записывает несколько артефактов так, что либо появляются все, либо ни один:
/// сначала во временные файлы рядом, затем переименование на место.
pub fn write_all(artifacts: &[(&Path, &str)]) -> Result<()> {
    let mut staged = Vec::with_capacity(artifacts.len());
    for &(path, encoded) in artifacts {
        match stage(path, encoded) {
            Ok(tmp) => staged.push((tmp, path)),
            Err(e) => {
                for (tmp, _) in &staged {
                    let _ = std::fs::remove_file(tmp);
                }
                return Err(e);
            }
        }
    }

    for (tmp, path) in &staged {
        std::fs::rename(tmp, path)
            .wrap_err_with(ErrorKind::Artifact, || format!("cannot move artifact into {}", path.display()))?;
    }
    Ok(())
}

fn stage(path: &Path, encoded: &str) -> Result<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| HousingError::new(ErrorKind::Artifact, format!("{} is not a file path", path.display())))?;
    if path.is_dir() {
        return Err(HousingError::new(ErrorKind::Artifact, format!("{} is a directory", path.display())));
    }
    let mut tmp_name = file_name.to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    write_encoded(&tmp, encoded)?;
    Ok(tmp)
}

pub fn save<T: Serialize>(path: &Path, kind: ArtifactKind, payload: &T) -> Result<()> {
    let encoded = encode(kind, payload)?;
    write_encoded(path, &encoded)
}

pub fn load<T: DeserializeOwned>(path: &Path, kind: ArtifactKind) -> Result<T> {
    let text = std::fs::read_to_string(path)
        .wrap_err_with(ErrorKind::Artifact, || format!("cannot read artifact {}", path.display()))?;
    let envelope: Envelope = serde_json::from_str(&text)
        .wrap_err_with(ErrorKind::Artifact, || format!("corrupt artifact {}", path.display()))?;

    if envelope.format_version != FORMAT_VERSION {
        return Err(HousingError::new(
            ErrorKind::Artifact,
            format!(
                "artifact {} has format version {}, this build reads version {}",
                path.display(),
                envelope.format_version,
                FORMAT_VERSION
            ),
        ));
    }
    if envelope.kind != kind {
        return Err(HousingError::new(
            ErrorKind::Artifact,
            format!("artifact {} holds {:?}, expected {:?}", path.display(), envelope.kind, kind),
        ));
    }

    serde_json::from_value(envelope.payload)
        .wrap_err_with(ErrorKind::Artifact, || format!("artifact {} does not match the expected schema", path.display()))
}
