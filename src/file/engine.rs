//! File engine
//!
//! Entry points applications use: find, delete, rename or copy a media item
//! by logical name, open files for reading or recording, and open / stream a
//! file onto a channel's [`MediaSession`].

use std::fs::{File, OpenOptions};
use std::path::PathBuf;
use std::sync::Arc;

use super::config::FileConfig;
use super::dispatch::{self, ActionResult, FileAction};
use super::filestream::{CacheMove, Filestream};
use super::resolver::{self, build_filename, Resolved};
use crate::error::{Error, Result};
use crate::media::{Format, FormatCap, Frame, MediaKind};
use crate::registry::FormatRegistry;
use crate::session::{Channel, MediaSession};
use crate::translate::{G711Translator, Translator};

/// Options for [`FileEngine::write_file`]
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// Keep existing content and add to the end
    pub append: bool,
}

impl WriteOptions {
    pub fn append() -> Self {
        Self { append: true }
    }
}

/// Media file engine bound to a format registry
pub struct FileEngine {
    registry: Arc<FormatRegistry>,
    config: FileConfig,
    translator: Arc<dyn Translator>,
}

impl FileEngine {
    /// Create an engine using the built-in G.711 translator
    pub fn new(registry: Arc<FormatRegistry>, config: FileConfig) -> Self {
        Self::with_translator(registry, config, Arc::new(G711Translator))
    }

    pub fn with_translator(
        registry: Arc<FormatRegistry>,
        config: FileConfig,
        translator: Arc<dyn Translator>,
    ) -> Self {
        Self {
            registry,
            config,
            translator,
        }
    }

    pub fn registry(&self) -> &Arc<FormatRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    pub fn translator(&self) -> &dyn Translator {
        self.translator.as_ref()
    }

    fn resolve_with<F>(
        &self,
        name: &str,
        preflang: &str,
        filter: Option<&str>,
        accept: F,
    ) -> Option<Resolved>
    where
        F: Fn(FormatCap) -> FormatCap,
    {
        resolver::resolve(&self.config, name, preflang, |candidate| {
            accept(dispatch::exists(&self.registry, &self.config, filter, candidate))
        })
    }

    /// Resolve `name` through the language chain
    pub fn find_file(&self, name: &str, filter: Option<&str>, preflang: &str) -> Option<Resolved> {
        self.resolve_with(name, preflang, filter, |found| found)
    }

    /// Whether `name` exists in any language and format
    pub fn file_exists(&self, name: &str, filter: Option<&str>, preflang: &str) -> bool {
        self.find_file(name, filter, preflang).is_some()
    }

    fn completed(result: ActionResult) -> usize {
        match result {
            ActionResult::Completed(n) => n,
            _ => 0,
        }
    }

    /// Delete `name` in every format matching `filter`
    pub fn delete(&self, name: &str, filter: Option<&str>) -> Result<usize> {
        let result =
            dispatch::dispatch(&self.registry, &self.config, filter, name, FileAction::Delete)?;
        Ok(Self::completed(result))
    }

    /// Rename `old` to `new` in every format matching `filter`
    pub fn rename(&self, old: &str, new: &str, filter: Option<&str>) -> Result<usize> {
        let result =
            dispatch::dispatch(&self.registry, &self.config, filter, old, FileAction::Rename(new))?;
        Ok(Self::completed(result))
    }

    /// Copy `old` to `new` in every format matching `filter`
    pub fn copy(&self, old: &str, new: &str, filter: Option<&str>) -> Result<usize> {
        let result =
            dispatch::dispatch(&self.registry, &self.config, filter, old, FileAction::Copy(new))?;
        Ok(Self::completed(result))
    }

    fn formats_for(&self, ext: &str) -> Result<Vec<Arc<dyn crate::codec::FormatDef>>> {
        let formats = self.registry.find_by_extension(ext);
        if formats.is_empty() {
            tracing::warn!(format = %ext, "No such format");
            return Err(Error::UnknownFormat(ext.to_string()));
        }
        Ok(formats)
    }

    /// Open `name.ext` for reading, without binding it to a channel
    pub fn read_file(&self, name: &str, ext: &str) -> Result<Filestream> {
        let mut last_error = None;
        for def in self.formats_for(ext)? {
            let path = build_filename(&self.config, name, ext);
            let file = match File::open(&path) {
                Ok(file) => file,
                Err(e) => {
                    tracing::debug!(path = %path.display(), error = %e, "Unable to open file");
                    last_error = Some(Error::not_found(name));
                    continue;
                }
            };
            match Filestream::create_for_read(def, file, &path, name) {
                Ok(fs) => return Ok(fs),
                Err(e) => last_error = Some(e),
            }
        }
        Err(last_error.unwrap_or_else(|| Error::not_found(name)))
    }

    fn cache_path(&self, dest: &std::path::Path) -> Option<PathBuf> {
        let dir = self.config.record_cache_dir.as_ref()?;
        Some(dir.join(dest.to_string_lossy().replace('/', "_")))
    }

    /// Open `name.ext` for recording
    ///
    /// The file is truncated unless `options.append` is set, in which case
    /// new frames land after the existing content. With a record cache
    /// directory configured, truncating recordings go to the cache and are
    /// moved into place when the stream closes.
    pub fn write_file(
        &self,
        name: &str,
        ext: &str,
        comment: Option<&str>,
        options: WriteOptions,
    ) -> Result<Filestream> {
        let mut last_error = None;
        for def in self.formats_for(ext)? {
            let dest = build_filename(&self.config, name, ext);
            let opened = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(!options.append)
                .open(&dest);
            let file = match opened {
                Ok(file) => file,
                Err(e) => {
                    tracing::warn!(
                        path = %dest.display(),
                        error = %e,
                        "Unable to open file for writing"
                    );
                    last_error = Some(Error::from(e));
                    continue;
                }
            };

            let cache = if options.append {
                None
            } else {
                self.cache_path(&dest)
            };

            let created = match &cache {
                Some(temp) => {
                    // the real path stays as an empty placeholder meanwhile
                    drop(file);
                    OpenOptions::new()
                        .read(true)
                        .write(true)
                        .create(true)
                        .truncate(true)
                        .open(temp)
                        .map_err(Error::from)
                        .and_then(|temp_file| {
                            Filestream::create_for_write(def, temp_file, temp, name, comment)
                        })
                }
                None => Filestream::create_for_write(def, file, &dest, name, comment),
            };

            let mut fs = match created {
                Ok(fs) => fs,
                Err(e) => {
                    last_error = Some(e);
                    continue;
                }
            };
            if let Some(temp) = cache {
                fs.set_cache(CacheMove {
                    temp,
                    dest: dest.clone(),
                });
            }
            fs.seek_to_end()?;

            tracing::debug!(
                path = %dest.display(),
                append = options.append,
                cached = self.config.record_cache_dir.is_some() && !options.append,
                "Opened file for recording"
            );
            return Ok(fs);
        }
        Err(last_error.unwrap_or_else(|| Error::UnknownFormat(ext.to_string())))
    }

    /// Record a frame
    ///
    /// Frames in a foreign audio format are translated. A video frame sent to
    /// an audio recording goes to a companion video file of the same name,
    /// created on first use; if that cannot be created the frame is dropped.
    pub fn write_stream(&self, fs: &mut Filestream, frame: &Frame) -> Result<()> {
        if frame.kind() == MediaKind::Video && fs.kind() == MediaKind::Audio {
            if fs.video().is_none() {
                match self.open_companion(fs.filename(), frame.format) {
                    Some(video) => fs.set_video(video),
                    None => {
                        tracing::trace!(format = %frame.format, "Dropping video frame");
                        return Ok(());
                    }
                }
            }
            return match fs.video_mut() {
                Some(video) => video.write_translated(frame, self.translator()),
                None => Ok(()),
            };
        }
        fs.write_translated(frame, self.translator())
    }

    fn open_companion(&self, name: &str, format: Format) -> Option<Filestream> {
        let def = self
            .registry
            .snapshot()
            .into_iter()
            .find(|def| def.format() == format)?;
        let ext = def.extensions().first()?.to_string();
        match self.write_file(name, &ext, None, WriteOptions::default()) {
            Ok(video) => Some(video),
            Err(e) => {
                tracing::warn!(
                    name = %name,
                    format = %format,
                    error = %e,
                    "Unable to record video"
                );
                None
            }
        }
    }

    /// Open `name` for playback on the session's channel
    ///
    /// Any current playback is stopped first. The channel's write format is
    /// switched to the best audio format the file exists in; the previous
    /// one is restored when the stream stops. On failure the channel is left
    /// as it was.
    pub fn open_stream<C: Channel>(
        &self,
        session: &mut MediaSession<C>,
        name: &str,
        preflang: &str,
    ) -> Result<()> {
        session.stop_stream();

        let audio_only = |found: FormatCap| found.of_kind(MediaKind::Audio);
        let Some(resolved) = self.resolve_with(name, preflang, None, audio_only) else {
            tracing::warn!(
                name = %name,
                language = %preflang,
                "File does not exist in any audio format"
            );
            return Err(Error::not_found(name));
        };

        let native = session.channel().native_formats();
        let chosen = resolved
            .formats
            .intersection(native)
            .first_of_kind(MediaKind::Audio)
            .or_else(|| resolved.formats.first_of_kind(MediaKind::Audio))
            .ok_or_else(|| Error::not_found(name))?;

        let old = session.channel().write_format();
        if let Err(e) = session.channel_mut().set_write_format(chosen) {
            tracing::warn!(
                channel = %session.channel().name(),
                name = %resolved.name,
                format = %chosen,
                error = %e,
                "Unable to set write format"
            );
            return Err(Error::NoCompatibleFormat {
                name: name.to_string(),
            });
        }

        let accept = FormatCap::single(chosen);
        let action = FileAction::Open { accept };
        match dispatch::dispatch(&self.registry, &self.config, None, &resolved.name, action) {
            Ok(ActionResult::Opened(fs)) => {
                tracing::debug!(
                    channel = %session.channel().name(),
                    file = %fs.path().display(),
                    format = %chosen,
                    "Opened stream"
                );
                session.remember_write_format(old);
                session.bind(fs);
                Ok(())
            }
            other => {
                if let Err(e) = session.channel_mut().set_write_format(old) {
                    tracing::warn!(error = %e, "Unable to restore write format");
                }
                match other {
                    Err(e) => Err(e),
                    Ok(_) => Err(Error::not_found(name)),
                }
            }
        }
    }

    /// Open the video part of `name` on a video-capable channel
    ///
    /// Only formats the channel carries natively qualify. `Ok(None)` when the
    /// channel has no video or no matching file exists.
    pub fn open_video_stream<C: Channel>(
        &self,
        session: &mut MediaSession<C>,
        name: &str,
        preflang: &str,
    ) -> Result<Option<Format>> {
        let video = session.channel().native_formats().of_kind(MediaKind::Video);
        if video.is_empty() {
            return Ok(None);
        }

        let native_video = |found: FormatCap| found.intersection(video);
        let Some(resolved) = self.resolve_with(name, preflang, None, native_video) else {
            return Ok(None);
        };
        let Some(format) = resolved.formats.first_of_kind(MediaKind::Video) else {
            return Ok(None);
        };

        let accept = FormatCap::single(format);
        let action = FileAction::Open { accept };
        match dispatch::dispatch(&self.registry, &self.config, None, &resolved.name, action)? {
            ActionResult::Opened(fs) => {
                session.bind(fs);
                Ok(Some(format))
            }
            _ => Ok(None),
        }
    }

    /// Open `name` (audio plus optional video) and start delivering it
    ///
    /// Empty files succeed without playing anything.
    pub fn stream_file<C: Channel>(
        &self,
        session: &mut MediaSession<C>,
        name: &str,
        preflang: &str,
    ) -> Result<()> {
        self.open_stream(session, name, preflang)?;

        let empty = session
            .audio_stream()
            .map(|fs| fs.file_len().map(|len| len == 0))
            .transpose()?
            .unwrap_or(true);
        if empty {
            tracing::debug!(name = %name, "Empty file, nothing to play");
            session.stop_stream();
            return Ok(());
        }

        match self.open_video_stream(session, name, preflang) {
            Ok(Some(format)) => tracing::debug!(name = %name, format = %format, "Playing video"),
            Ok(None) => {}
            Err(e) => tracing::warn!(name = %name, error = %e, "Unable to open video stream"),
        }

        tracing::info!(
            channel = %session.channel().name(),
            name = %name,
            language = %preflang,
            "Playing file"
        );
        if let Err(e) = session.play_stream() {
            session.stop_stream();
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::StreamPhase;
    use crate::testing::MockChannel;
    use bytes::Bytes;
    use std::fs;

    fn engine(dir: &std::path::Path) -> FileEngine {
        let config = FileConfig::with_sounds_dir(dir.join("sounds"));
        fs::create_dir_all(dir.join("sounds")).unwrap();
        FileEngine::new(Arc::new(FormatRegistry::with_builtin_formats()), config)
    }

    fn write_sound(dir: &std::path::Path, rel: &str, bytes: &[u8]) {
        let path = dir.join("sounds").join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    fn alaw_frame(byte: u8) -> Frame {
        Frame::new(Format::Alaw, Bytes::from(vec![byte; 160]), 160)
    }

    #[test]
    fn test_find_file_language_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        write_sound(dir.path(), "en/hello.alaw", &[0xD5; 160]);

        let resolved = engine.find_file("hello", None, "en_US").unwrap();
        assert_eq!(resolved.name, "en/hello");
        assert_eq!(resolved.formats, FormatCap::single(Format::Alaw));
        assert!(engine.file_exists("hello", Some("alaw"), "en_US"));
        assert!(!engine.file_exists("hello", Some("g723"), "en_US"));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let mut rec = engine
            .write_file("rec", "alaw", None, WriteOptions::default())
            .unwrap();
        for byte in [1u8, 2, 3] {
            engine.write_stream(&mut rec, &alaw_frame(byte)).unwrap();
        }
        rec.close().unwrap();

        let mut play = engine.read_file("rec", "alaw").unwrap();
        let mut firsts = Vec::new();
        while let Some(read) = play.read_frame().unwrap() {
            firsts.push(read.frame.data[0]);
        }
        assert_eq!(firsts, vec![1, 2, 3]);

        assert!(matches!(engine.read_file("rec", "wav"), Err(Error::UnknownFormat(_))));
        assert!(matches!(engine.read_file("nope", "alaw"), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_append_keeps_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let mut rec = engine.write_file("log", "alaw", None, WriteOptions::default()).unwrap();
        engine.write_stream(&mut rec, &alaw_frame(1)).unwrap();
        drop(rec);

        let mut rec = engine.write_file("log", "alaw", None, WriteOptions::append()).unwrap();
        engine.write_stream(&mut rec, &alaw_frame(2)).unwrap();
        drop(rec);

        let data = fs::read(dir.path().join("sounds/log.alaw")).unwrap();
        assert_eq!(data.len(), 320);
        assert_eq!((data[0], data[160]), (1, 2));
    }

    #[test]
    fn test_cached_recording_moved_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("cache");
        fs::create_dir_all(&cache).unwrap();
        let config = FileConfig::with_sounds_dir(dir.path()).record_cache_dir(&cache);
        let engine = FileEngine::new(Arc::new(FormatRegistry::with_builtin_formats()), config);

        let mut rec = engine.write_file("vm/msg", "alaw", None, WriteOptions::default());
        assert!(rec.is_err());

        fs::create_dir_all(dir.path().join("vm")).unwrap();
        rec = engine.write_file("vm/msg", "alaw", None, WriteOptions::default());
        let mut rec = rec.unwrap();
        let dest = dir.path().join("vm/msg.alaw");
        let temp = rec.path().to_path_buf();
        assert!(temp.starts_with(&cache));
        assert_eq!(fs::metadata(&dest).unwrap().len(), 0);

        engine.write_stream(&mut rec, &alaw_frame(7)).unwrap();
        engine.write_stream(&mut rec, &alaw_frame(7)).unwrap();
        rec.close().unwrap();

        assert_eq!(fs::metadata(&dest).unwrap().len(), 320);
        assert!(!temp.exists());
    }

    #[test]
    fn test_video_frame_opens_companion_recording() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());

        let mut rec = engine.write_file("call", "alaw", None, WriteOptions::default()).unwrap();
        engine.write_stream(&mut rec, &alaw_frame(1)).unwrap();
        let video = Frame::video(Format::H264, Bytes::from_static(&[0x65, 1, 2]), 90, true);
        engine.write_stream(&mut rec, &video).unwrap();

        assert_eq!(rec.video().map(|v| v.format()), Some(Format::H264));
        rec.close().unwrap();
        // 4-byte timestamp, 2-byte length, payload
        assert_eq!(fs::read(dir.path().join("sounds/call.h264")).unwrap().len(), 9);
        assert_eq!(fs::read(dir.path().join("sounds/call.alaw")).unwrap().len(), 160);
    }

    #[test]
    fn test_open_stream_sets_and_restores_write_format() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        write_sound(dir.path(), "hello.ul", &[0xFF; 480]);

        let mut session = MediaSession::new(MockChannel::new("SIP/alice-0001"));
        engine.open_stream(&mut session, "hello", "en").unwrap();
        assert_eq!(session.channel().write_format(), Format::Ulaw);
        assert_eq!(session.audio_stream().unwrap().def().name(), "pcm");

        session.stop_stream();
        assert_eq!(session.channel().write_format(), Format::Slin);
    }

    #[test]
    fn test_open_stream_failure_leaves_channel_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        write_sound(dir.path(), "g.g723", &[0, 0, 0, 30, 0, 2, 1, 2]);

        let mut session = MediaSession::new(MockChannel::new("SIP/bob-0002"));
        let err = engine.open_stream(&mut session, "g", "en").unwrap_err();
        assert!(matches!(err, Error::NoCompatibleFormat { .. }));
        assert_eq!(session.channel().write_format(), Format::Slin);
        assert!(!session.is_playing());

        let err = engine.open_stream(&mut session, "missing", "en").unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_file_skips_empty() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        write_sound(dir.path(), "silence.alaw", &[]);

        let mut session = MediaSession::new(MockChannel::new("SIP/carol-0003"));
        engine.stream_file(&mut session, "silence", "en").unwrap();
        assert!(!session.is_playing());
        assert!(session.channel().written().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_file_with_video() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path());
        write_sound(dir.path(), "intro.alaw", &[0xD5; 1600]);

        let mut rec = engine.write_file("intro", "h264", None, WriteOptions::default()).unwrap();
        for ts in [0u32, 450, 450] {
            let frame = Frame::video(Format::H264, Bytes::from_static(&[0x41, 9, 9]), ts, true);
            engine.write_stream(&mut rec, &frame).unwrap();
        }
        drop(rec);

        let native: FormatCap = [Format::Slin, Format::Alaw, Format::H264].into_iter().collect();
        let mut session = MediaSession::new(MockChannel::new("SIP/dave-0004").with_native(native));
        engine.stream_file(&mut session, "intro", "en").unwrap();

        assert_eq!(session.video_stream().map(|v| v.format()), Some(Format::H264));
        assert_eq!(session.phase(MediaKind::Audio), Some(StreamPhase::Armed));
        assert_eq!(session.phase(MediaKind::Video), Some(StreamPhase::Armed));
        assert_eq!(session.channel().write_format(), Format::Alaw);
        // one audio frame and one video frame in the first pass
        assert_eq!(session.channel().written().len(), 2);
    }
}
