//! Wrapper scripts that boot the model under each serving protocol.

use tera::Context;

use crate::config::EntryPoint;
use crate::docker::templates;
use crate::error::GenerateError;

/// Directory user code is copied into and served from.
pub const CODE_DIR: &str = "/code";

/// Serving protocols available in every image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeMode {
    /// HTTP prediction server; the image's default command.
    Http,
    /// AI Platform custom prediction routine server.
    AiPlatformPrediction,
    /// Redis queue worker. Connection details come from positional arguments
    /// at container run time: host, port, input queue, upload URL, consumer id.
    RedisQueueWorker,
}

impl ServeMode {
    /// All modes, in emission order.
    pub const ALL: [ServeMode; 3] = [
        ServeMode::Http,
        ServeMode::AiPlatformPrediction,
        ServeMode::RedisQueueWorker,
    ];

    /// Absolute path of the wrapper script.
    pub fn script_path(&self) -> &'static str {
        match self {
            ServeMode::Http => "/usr/bin/cog-http-server",
            ServeMode::AiPlatformPrediction => "/usr/bin/cog-ai-platform-prediction-server",
            ServeMode::RedisQueueWorker => "/usr/bin/cog-redis-queue-worker",
        }
    }

    /// Python statement that starts the server for a model class.
    pub fn invocation(&self, class_name: &str) -> String {
        match self {
            ServeMode::Http => format!("cog.HTTPServer({}()).start_server()", class_name),
            ServeMode::AiPlatformPrediction => {
                format!("cog.AIPlatformPredictionServer({}()).start_server()", class_name)
            }
            ServeMode::RedisQueueWorker => format!(
                "cog.RedisQueueWorker({}(), redis_host=sys.argv[1], redis_port=sys.argv[2], \
                 input_queue=sys.argv[3], upload_url=sys.argv[4], consumer_id=sys.argv[5]).start()",
                class_name
            ),
        }
    }
}

/// Emit one wrapper script and its `chmod`.
pub fn emit_server_script(mode: ServeMode, entry_point: &EntryPoint) -> Result<String, GenerateError> {
    let mut context = Context::new();
    context.insert("code_dir", CODE_DIR);
    context.insert("import_line", &entry_point.import_statement());
    context.insert("invocation", &mode.invocation(entry_point.class()));
    context.insert("path", mode.script_path());
    templates::render(
        &format!("server script {}", mode.script_path()),
        templates::SERVER_SCRIPT,
        &context,
    )
}

/// Emit every wrapper script, in [`ServeMode::ALL`] order.
pub fn emit_server_scripts(entry_point: &EntryPoint) -> Result<String, GenerateError> {
    let scripts = ServeMode::ALL
        .iter()
        .map(|mode| emit_server_script(*mode, entry_point))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(scripts.join("\n"))
}
