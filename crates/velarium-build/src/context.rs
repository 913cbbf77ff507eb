use crate::error::{BuildError, BuildResult};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use tar::Builder;

/// modpackからビルドコンテキストへコピーするディレクトリ
pub const MODPACK_DIRS: [&str; 2] = ["mods", "config"];

pub struct ContextBuilder;

impl ContextBuilder {
    /// ビルドコンテキストをtar.gzアーカイブとして作成
    ///
    /// `Dockerfile` を必ず含み、modpackが渡された場合は
    /// その中で最初に見つかった `mods/` と `config/` をルートに追加する。
    pub fn create_context(dockerfile: &str, modpack: Option<&[u8]>) -> BuildResult<Vec<u8>> {
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);
            tar.follow_symlinks(false);

            let mut header = tar::Header::new_gnu();
            header.set_path("Dockerfile").map_err(|e| {
                BuildError::InvalidConfig(format!("Failed to set Dockerfile path: {}", e))
            })?;
            header.set_size(dockerfile.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();

            tar.append(&header, dockerfile.as_bytes())
                .map_err(BuildError::Io)?;

            if let Some(archive) = modpack {
                Self::append_modpack(&mut tar, archive)?;
            }

            tar.into_inner()?.finish()?;
        }

        tracing::debug!("Build context created: {} bytes", archive_data.len());

        // コンテキストサイズの警告
        Self::check_context_size(archive_data.len());

        Ok(archive_data)
    }

    /// modpackのzipを一時ディレクトリに展開し、対象ディレクトリを追加
    fn append_modpack<W: Write>(tar: &mut Builder<W>, archive: &[u8]) -> BuildResult<()> {
        let scratch = tempfile::tempdir()?;
        let mut zip = zip::ZipArchive::new(Cursor::new(archive))?;
        tracing::debug!("Extracting modpack: {} entries", zip.len());

        // 展開先の外を指すエントリを含むアーカイブは丸ごと拒否する
        for i in 0..zip.len() {
            let entry = zip.by_index(i)?;
            if entry.enclosed_name().is_none() {
                return Err(BuildError::Upstream(format!(
                    "modpack entry escapes the archive root: {}",
                    entry.name()
                )));
            }
        }
        zip.extract(scratch.path())?;

        for name in MODPACK_DIRS {
            match Self::find_dir(scratch.path(), name)? {
                Some(dir) => {
                    tracing::debug!("Adding {}/ from {}", name, dir.display());
                    tar.append_dir_all(name, &dir).map_err(BuildError::Io)?;
                }
                None => {
                    tracing::debug!("Modpack has no {}/ directory", name);
                }
            }
        }

        Ok(())
    }

    /// `root` 以下を深さ優先で探索し、名前が一致する最初のディレクトリを返す
    ///
    /// 兄弟エントリは名前順に辿る。シンボリックリンクは辿らない。
    pub fn find_dir(root: &Path, name: &str) -> BuildResult<Option<PathBuf>> {
        let mut entries = std::fs::read_dir(root)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        entries.sort();

        for path in entries {
            let file_type = std::fs::symlink_metadata(&path)?.file_type();
            if !file_type.is_dir() {
                continue;
            }
            if path.file_name().is_some_and(|n| n == name) {
                return Ok(Some(path));
            }
            if let Some(found) = Self::find_dir(&path, name)? {
                return Ok(Some(found));
            }
        }

        Ok(None)
    }

    /// コンテキストサイズのチェックと警告
    fn check_context_size(size: usize) {
        const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024; // 500MB

        if size > MAX_CONTEXT_SIZE {
            tracing::warn!(
                "警告: ビルドコンテキストが大きすぎます（{}MB）\n\
                 modpackのサイズを確認してください。",
                size / 1024 / 1024
            );
        }
    }
}
