use anyhow::Context as _;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::time::Duration;

pub use gantry_test_support::{KillOnDrop, retry_until};

pub fn pick_unused_port() -> anyhow::Result<u16> {
    gantry_test_support::pick_unused_port()
}

pub async fn wait_http_ok(url: &str, timeout_dur: Duration) -> anyhow::Result<()> {
    gantry_test_support::wait_http_ok(url, timeout_dur).await
}

/// Fixture spec: three operations, one without an operationId, one secured.
pub const PETSTORE_SPEC: &str = r#"
openapi: "3.0.0"
info: { title: petstore, version: "1" }
components:
  securitySchemes:
    apiKeyAuth:
      type: apiKey
      in: header
      name: X-Api-Key
paths:
  /pets:
    get:
      operationId: listPets
      tags: [pets]
      parameters:
        - name: limit
          in: query
          required: false
          schema: { type: integer }
      responses:
        "200": { description: ok }
    post:
      tags: [pets]
      security:
        - apiKeyAuth: []
      requestBody:
        required: true
        content:
          application/json:
            schema:
              type: object
              required: [name]
              properties:
                name: { type: string }
      responses:
        "201": { description: created }
  /pets/{petId}:
    get:
      operationId: getPet
      parameters:
        - name: petId
          in: path
          required: true
          schema: { type: string }
      responses:
        "200": { description: ok }
"#;

/// The fixture spec plus one extra operation; used to exercise reload.
pub const PETSTORE_SPEC_V2: &str = r#"
openapi: "3.0.0"
info: { title: petstore, version: "2" }
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        "200": { description: ok }
  /pets/{petId}:
    get:
      operationId: getPet
      parameters:
        - name: petId
          in: path
          required: true
          schema: { type: string }
      responses:
        "200": { description: ok }
    delete:
      operationId: deletePet
      parameters:
        - name: petId
          in: path
          required: true
          schema: { type: string }
      responses:
        "204": { description: gone }
"#;

/// Write the fixture spec and a config pointing at it; returns
/// `(config_path, spec_path)`.
pub fn write_bridge_config(dir: &Path) -> anyhow::Result<(PathBuf, PathBuf)> {
    let spec_path = dir.join("petstore.yaml");
    std::fs::write(&spec_path, PETSTORE_SPEC).context("write spec fixture")?;

    let config_path = dir.join("bridge.yaml");
    std::fs::write(
        &config_path,
        format!(
            "spec: {}\nbaseUrl: https://api.example.invalid\n",
            spec_path.display()
        ),
    )
    .context("write bridge config")?;

    Ok((config_path, spec_path))
}

pub fn spawn_bridge(config_path: &Path, port: u16) -> anyhow::Result<Child> {
    let bin = env!("CARGO_BIN_EXE_gantry-mcp-bridge");
    Command::new(bin)
        .arg("--config")
        .arg(config_path)
        .arg("--bind")
        .arg(format!("127.0.0.1:{port}"))
        .arg("--log-level")
        .arg("info")
        .spawn()
        .context("spawn bridge")
}
