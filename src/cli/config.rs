use std::fs;
use std::path::Path;

const SAMPLE_CONFIG: &str = r#"# albsync profile. One file per environment under resources/.
s3:
  bucket: $env{ALB_LOG_BUCKET}
  # Prefix the load balancer writes under, without the /YYYY/MM/DD/ suffix
  base_path: AWSLogs/123456789012/elasticloadbalancing/us-east-1
  # First date to ingest when no successful run has been recorded yet
  start_date: 2024-01-01
  # region: us-east-1
  # endpoint_url: http://localhost:9000   # minio/localstack

database:
  path: albsync.duckdb

# watermark:
#   backend: database   # or 'file' for the legacy JSON state file
#   state_file: last_sync.json
"#;

/// Write a starter profile, or print it with --stdout.
pub fn init(stdout: bool) -> Result<(), Box<dyn std::error::Error>> {
    if stdout {
        print!("{}", SAMPLE_CONFIG);
        return Ok(());
    }

    let target = Path::new("resources/local.yml");
    if target.exists() {
        return Err(format!("refusing to overwrite existing {}", target.display()).into());
    }

    fs::create_dir_all("resources")?;
    fs::write(target, SAMPLE_CONFIG)?;
    println!("Wrote starter profile to {}", target.display());
    Ok(())
}
