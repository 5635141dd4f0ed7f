//! tracing을 사용한 로깅 인프라.
//!
//! 이 모듈은 다양한 출력 형식을 지원하는 구조화된 로깅을 제공합니다:
//! - **pretty**: 개발용 사람이 읽기 쉬운 형식
//! - **json**: 로그 집계용 JSON 형식
//! - **compact**: 로그 크기를 줄이기 위한 간결한 형식
//!
//! 출력은 [`MultiWriter`]를 통해 표준 출력과 여러 파일로 동시에 보낼 수 있습니다.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::LoggingConfig;

/// 로그 출력 형식.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// 색상이 포함된 사람이 읽기 쉬운 형식 (개발용)
    #[default]
    Pretty,
    /// 로그 집계용 JSON 형식
    Json,
    /// 간결한 한 줄 형식
    Compact,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            "compact" => Ok(Self::Compact),
            _ => Err(format!("Unknown log format: {}", s)),
        }
    }
}

/// 로깅 설정.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 로그 레벨 필터 (예: "info", "debug", "trader_execution=debug")
    pub level: String,
    /// 출력 형식
    pub format: LogFormat,
    /// span 이벤트 포함 여부 (진입/종료)
    pub with_span_events: bool,
    /// 대상(모듈 경로) 포함 여부
    pub with_target: bool,
    /// 표준 출력 사용 여부
    pub stdout: bool,
    /// 추가로 기록할 로그 파일
    pub files: Vec<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_span_events: false,
            with_target: true,
            stdout: true,
            files: Vec::new(),
        }
    }
}

impl LogConfig {
    /// 새 로그 설정을 생성합니다.
    pub fn new(level: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            ..Default::default()
        }
    }

    /// 로그 형식을 설정합니다.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// 로그 파일을 추가합니다.
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.files.push(path.into());
        self
    }
}

impl From<&LoggingConfig> for LogConfig {
    fn from(config: &LoggingConfig) -> Self {
        Self {
            level: config.level.clone(),
            format: config.format.parse().unwrap_or_default(),
            files: config.files.iter().map(PathBuf::from).collect(),
            ..Default::default()
        }
    }
}

/// 주어진 설정으로 로깅 시스템을 초기화합니다.
///
/// # 예제
///
/// ```no_run
/// use trader_core::logging::{init_logging, LogConfig, LogFormat};
///
/// let config = LogConfig::new("debug")
///     .with_format(LogFormat::Json)
///     .with_file("backtest.log");
/// init_logging(config).unwrap();
/// ```
pub fn init_logging(config: LogConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let span_events = if config.with_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let writer = MultiWriter::new();
    if config.stdout {
        writer.add(MultiWriter::shared(io::stdout()))?;
    }
    for path in &config.files {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        writer.add(MultiWriter::shared(file))?;
    }
    let ansi = config.files.is_empty();

    match config.format {
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer()
                .pretty()
                .with_ansi(ansi)
                .with_target(config.with_target)
                .with_span_events(span_events)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(config.with_target)
                .with_span_events(span_events)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer()
                .compact()
                .with_ansi(ansi)
                .with_target(config.with_target)
                .with_span_events(span_events)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    tracing::info!(
        format = ?config.format,
        level = %config.level,
        files = config.files.len(),
        "Logging initialized"
    );

    Ok(())
}

/// 멀티 라이터 에러.
#[derive(Debug, Error)]
pub enum LogWriterError {
    #[error("writer already loaded")]
    WriterAlreadyLoaded,

    #[error("writer not found")]
    WriterNotFound,
}

/// 여러 스레드가 공유하는 출력 대상.
pub type SharedWriter = Arc<Mutex<dyn Write + Send>>;

/// 하나의 기록을 등록된 모든 출력 대상으로 복제하는 라이터.
///
/// 복제본은 같은 대상 목록을 공유하므로 `MakeWriter`로 그대로 넘길 수 있습니다.
#[derive(Clone, Default)]
pub struct MultiWriter {
    writers: Arc<RwLock<Vec<SharedWriter>>>,
}

impl MultiWriter {
    /// 빈 멀티 라이터를 생성합니다.
    pub fn new() -> Self {
        Self::default()
    }

    /// 출력 대상을 공유 가능한 형태로 감쌉니다.
    pub fn shared<W: Write + Send + 'static>(writer: W) -> SharedWriter {
        Arc::new(Mutex::new(writer))
    }

    /// 출력 대상을 추가합니다. 같은 대상을 두 번 추가할 수 없습니다.
    pub fn add(&self, writer: SharedWriter) -> Result<(), LogWriterError> {
        let mut writers = self.writers.write().unwrap_or_else(|e| e.into_inner());
        if writers.iter().any(|w| Arc::ptr_eq(w, &writer)) {
            return Err(LogWriterError::WriterAlreadyLoaded);
        }
        writers.push(writer);
        Ok(())
    }

    /// 출력 대상을 제거합니다.
    pub fn remove(&self, writer: &SharedWriter) -> Result<(), LogWriterError> {
        let mut writers = self.writers.write().unwrap_or_else(|e| e.into_inner());
        let index = writers
            .iter()
            .position(|w| Arc::ptr_eq(w, writer))
            .ok_or(LogWriterError::WriterNotFound)?;
        writers.swap_remove(index);
        Ok(())
    }

    /// 등록된 출력 대상 수를 반환합니다.
    pub fn len(&self) -> usize {
        self.writers.read().map(|w| w.len()).unwrap_or(0)
    }

    /// 등록된 출력 대상이 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for MultiWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let writers = self.writers.read().unwrap_or_else(|e| e.into_inner());
        for (i, writer) in writers.iter().enumerate() {
            let mut guard = writer.lock().unwrap_or_else(|e| e.into_inner());
            let n = guard
                .write(buf)
                .map_err(|e| io::Error::new(e.kind(), format!("writer {}: {}", i, e)))?;
            if n != buf.len() {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    format!("writer {}: short write", i),
                ));
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        let writers = self.writers.read().unwrap_or_else(|e| e.into_inner());
        for writer in writers.iter() {
            writer.lock().unwrap_or_else(|e| e.into_inner()).flush()?;
        }
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for MultiWriter {
    type Writer = MultiWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 받은 바이트를 기록하는 테스트용 라이터
    #[derive(Default)]
    struct Capture(Vec<u8>);

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// 항상 한 바이트만 기록하는 라이터
    struct Stingy;

    impl Write for Stingy {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len().min(1))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert!("invalid".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_log_config_from_logging_config() {
        let logging = LoggingConfig {
            level: "debug".to_string(),
            format: "nonsense".to_string(),
            files: vec!["run.log".to_string()],
        };
        let config = LogConfig::from(&logging);
        assert_eq!(config.level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert_eq!(config.files, vec![PathBuf::from("run.log")]);
    }

    #[test]
    fn test_multi_writer_fans_out() {
        let first = Arc::new(Mutex::new(Capture::default()));
        let second = Arc::new(Mutex::new(Capture::default()));
        let mut writer = MultiWriter::new();
        writer.add(first.clone()).unwrap();
        writer.add(second.clone()).unwrap();

        writer.write_all(b"hello").unwrap();

        assert_eq!(first.lock().unwrap().0, b"hello");
        assert_eq!(second.lock().unwrap().0, b"hello");
    }

    #[test]
    fn test_multi_writer_rejects_duplicate_and_unknown() {
        let writer = MultiWriter::new();
        let target = MultiWriter::shared(Capture::default());
        writer.add(target.clone()).unwrap();
        assert!(matches!(
            writer.add(target.clone()),
            Err(LogWriterError::WriterAlreadyLoaded)
        ));

        writer.remove(&target).unwrap();
        assert!(writer.is_empty());
        assert!(matches!(
            writer.remove(&target),
            Err(LogWriterError::WriterNotFound)
        ));
    }

    #[test]
    fn test_multi_writer_reports_short_write() {
        let mut writer = MultiWriter::new();
        writer.add(MultiWriter::shared(Stingy)).unwrap();
        let err = writer.write(b"abc").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WriteZero);
    }
}
