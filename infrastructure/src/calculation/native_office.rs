//! Native office automation backend (Excel over COM, driven by PowerShell)
//!
//! Runs on Windows, or under WSL through `powershell.exe` with paths
//! translated by `wslpath`. The generated script releases every COM handle
//! in a `finally` block so a failed recalculation never strands an Excel
//! process.

use super::process;
use crate::config::FileNativeOfficeConfig;
use async_trait::async_trait;
use rater_application::{CalculationBackend, CalculationContext, CalculationError};
use rater_domain::CalculationMethod;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info};

const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

const PROBE: &str = "$ErrorActionPreference = 'Stop'; \
$excel = New-Object -ComObject Excel.Application; \
$excel.Quit(); \
[void][System.Runtime.InteropServices.Marshal]::ReleaseComObject($excel); \
Write-Output 'OK'";

const RECALC_SCRIPT: &str = r#"param(
    [Parameter(Mandatory = $true)][string]$InputPath,
    [Parameter(Mandatory = $true)][string]$OutputPath
)
$ErrorActionPreference = 'Stop'
$excel = $null
$workbooks = $null
$workbook = $null
try {
    $excel = New-Object -ComObject Excel.Application
    $excel.Visible = $false
    $excel.DisplayAlerts = $false
    $excel.ScreenUpdating = $false
    $workbooks = $excel.Workbooks
    $workbook = $workbooks.Open($InputPath, 0, $false)
    $excel.CalculateFull()
    # 51 = xlOpenXMLWorkbook
    $workbook.SaveAs($OutputPath, 51)
    Write-Output 'OK'
}
finally {
    if ($workbook -ne $null) {
        $workbook.Close($false)
        [void][System.Runtime.InteropServices.Marshal]::ReleaseComObject($workbook)
    }
    if ($workbooks -ne $null) {
        [void][System.Runtime.InteropServices.Marshal]::ReleaseComObject($workbooks)
    }
    if ($excel -ne $null) {
        $excel.Quit()
        [void][System.Runtime.InteropServices.Marshal]::ReleaseComObject($excel)
    }
    [System.GC]::Collect()
    [System.GC]::WaitForPendingFinalizers()
}
"#;

pub struct NativeOfficeBackend {
    powershell: String,
    timeout: Duration,
    availability: OnceCell<bool>,
}

impl NativeOfficeBackend {
    pub fn new(powershell: impl Into<String>) -> Self {
        Self {
            powershell: powershell.into(),
            timeout: Duration::from_secs(180),
            availability: OnceCell::new(),
        }
    }

    pub fn from_config(config: &FileNativeOfficeConfig) -> Self {
        Self::new(config.powershell.clone()).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, program: &Path) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(["-NoProfile", "-NonInteractive", "-ExecutionPolicy", "Bypass"]);
        cmd
    }

    async fn probe(&self) -> bool {
        if !cfg!(windows) && !is_wsl() {
            return false;
        }
        let Some(program) = process::resolve_program(&self.powershell) else {
            return false;
        };
        let mut cmd = self.command(&program);
        cmd.arg("-Command").arg(PROBE);
        match process::run(cmd, PROBE_TIMEOUT).await {
            Ok(output) => {
                output.status.success() && String::from_utf8_lossy(&output.stdout).contains("OK")
            }
            Err(e) => {
                debug!("Office automation probe failed: {}", e);
                false
            }
        }
    }
}

/// Running under the Windows Subsystem for Linux
fn is_wsl() -> bool {
    std::fs::read_to_string("/proc/version")
        .map(|version| {
            let version = version.to_lowercase();
            version.contains("microsoft") || version.contains("wsl")
        })
        .unwrap_or(false)
}

/// Path as seen by the Windows side
async fn windows_path(path: &Path) -> String {
    if cfg!(windows) {
        return path.display().to_string();
    }
    let mut cmd = Command::new("wslpath");
    cmd.arg("-w").arg(path);
    if let Ok(output) = process::run(cmd, Duration::from_secs(10)).await
        && output.status.success()
    {
        let converted = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !converted.is_empty() {
            return converted;
        }
    }
    mount_path(path)
}

/// `/mnt/c/Users/x` → `C:\Users\x`; other paths go through the `\\wsl$` share
fn mount_path(path: &Path) -> String {
    let text = path.to_string_lossy();
    if let Some(rest) = text.strip_prefix("/mnt/") {
        let mut parts = rest.splitn(2, '/');
        if let Some(drive) = parts.next()
            && drive.len() == 1
        {
            let tail = parts.next().unwrap_or("").replace('/', "\\");
            return format!("{}:\\{}", drive.to_uppercase(), tail);
        }
    }
    let distro = std::env::var("WSL_DISTRO_NAME").unwrap_or_else(|_| "Ubuntu".to_string());
    format!("\\\\wsl$\\{}{}", distro, text.replace('/', "\\"))
}

#[async_trait]
impl CalculationBackend for NativeOfficeBackend {
    fn method(&self) -> CalculationMethod {
        CalculationMethod::NativeOffice
    }

    async fn is_available(&self) -> bool {
        *self.availability.get_or_init(|| self.probe()).await
    }

    async fn calculate(
        &self,
        workbook: &[u8],
        _context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError> {
        if !self.is_available().await {
            return Err(CalculationError::Unavailable(
                "Excel automation is not reachable".to_string(),
            ));
        }
        let program: PathBuf = process::resolve_program(&self.powershell).ok_or_else(|| {
            CalculationError::Unavailable(format!("{} not found", self.powershell))
        })?;

        let dir = process::temp_dir()?;
        let input = dir.path().join("rater.xlsx");
        let output_path = dir.path().join("rater-calculated.xlsx");
        let script = dir.path().join("recalculate.ps1");
        process::write_file(&input, workbook).await?;
        process::write_file(&script, RECALC_SCRIPT.as_bytes()).await?;

        info!("Recalculating rater through Excel automation");
        let mut cmd = self.command(&program);
        cmd.arg("-File")
            .arg(windows_path(&script).await)
            .arg("-InputPath")
            .arg(windows_path(&input).await)
            .arg("-OutputPath")
            .arg(windows_path(&output_path).await);
        let output = process::run(cmd, self.timeout).await?;
        process::check_status("Excel automation", &output)?;

        process::read_file(&output_path).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_releases_com_objects() {
        assert!(RECALC_SCRIPT.contains("CalculateFull()"));
        let finally = RECALC_SCRIPT.split("finally").nth(1).unwrap();
        assert_eq!(finally.matches("ReleaseComObject").count(), 3);
        assert!(finally.contains("$excel.Quit()"));
    }

    #[test]
    fn test_mount_path() {
        assert_eq!(mount_path(Path::new("/mnt/c/Temp/rater.xlsx")), r"C:\Temp\rater.xlsx");
        assert!(mount_path(Path::new("/tmp/ims-rater-1/rater.xlsx")).starts_with(r"\\wsl$\"));
    }

    #[tokio::test]
    async fn test_unavailable_without_powershell() {
        let backend = NativeOfficeBackend::new("ims-rater-no-such-powershell");
        assert!(!backend.is_available().await);
        let result = backend
            .calculate(b"x", &CalculationContext::default())
            .await;
        assert!(matches!(result, Err(CalculationError::Unavailable(_))));
    }
}
