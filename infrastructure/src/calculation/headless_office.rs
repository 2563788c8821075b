//! Headless office-suite backend (LibreOffice `soffice`)
//!
//! xlsx → ods (`calc8`) → recalculation macro → xlsx (`Calc MS Excel 2007 XML`).
//! Every run uses a private user profile inside its temporary directory, so
//! it neither collides with a desktop instance nor depends on its settings.

use super::process;
use crate::config::FileHeadlessOfficeConfig;
use async_trait::async_trait;
use rater_application::{CalculationBackend, CalculationContext, CalculationError};
use rater_domain::CalculationMethod;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

const KNOWN_INSTALLS: [&str; 6] = [
    "/usr/bin/soffice",
    "/usr/lib/libreoffice/program/soffice",
    "/opt/libreoffice/program/soffice",
    "/Applications/LibreOffice.app/Contents/MacOS/soffice",
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];

/// Always recalculate formulas when loading OOXML and ODF documents
const REGISTRY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<oor:items xmlns:oor="http://openoffice.org/2001/registry" xmlns:xs="http://www.w3.org/2001/XMLSchema" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<item oor:path="/org.openoffice.Office.Calc/Formula/Load"><prop oor:name="OOXMLRecalcMode" oor:op="fuse"><value>0</value></prop></item>
<item oor:path="/org.openoffice.Office.Calc/Formula/Load"><prop oor:name="ODFRecalcMode" oor:op="fuse"><value>0</value></prop></item>
</oor:items>
"#;

const BASIC_LIBRARIES: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE library:libraries PUBLIC "-//OpenOffice.org//DTD OfficeDocument 1.0//EN" "libraries.dtd">
<library:libraries xmlns:library="http://openoffice.org/2000/library" xmlns:xlink="http://www.w3.org/1999/xlink">
 <library:library library:name="Standard" xlink:href="$(USER)/basic/Standard/script.xlb/" xlink:type="simple" library:link="false"/>
</library:libraries>
"#;

const BASIC_LIBRARY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE library:library PUBLIC "-//OpenOffice.org//DTD OfficeDocument 1.0//EN" "library.dtd">
<library:library xmlns:library="http://openoffice.org/2000/library" library:name="Standard" library:readonly="false" library:passwordprotected="false">
 <library:element library:name="Recalc"/>
</library:library>
"#;

const BASIC_MODULE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE script:module PUBLIC "-//OpenOffice.org//DTD OfficeDocument 1.0//EN" "module.dtd">
<script:module xmlns:script="http://openoffice.org/2000/script" script:name="Recalc" script:language="StarBasic">
Sub CalculateAll(url As String)
    Dim args(0) As New com.sun.star.beans.PropertyValue
    args(0).Name = &quot;Hidden&quot;
    args(0).Value = True
    doc = StarDesktop.loadComponentFromURL(url, &quot;_blank&quot;, 0, args())
    doc.calculateAll()
    doc.store()
    doc.close(True)
End Sub
</script:module>
"#;

pub struct HeadlessOfficeBackend {
    binary: Option<PathBuf>,
    timeout: Duration,
}

impl HeadlessOfficeBackend {
    pub fn new(binary: Option<PathBuf>) -> Self {
        Self {
            binary,
            timeout: Duration::from_secs(120),
        }
    }

    pub fn from_config(config: &FileHeadlessOfficeConfig) -> Self {
        Self::new(config.binary.clone()).with_timeout(config.timeout())
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured binary, else `soffice`/`libreoffice` on PATH, else a known install path
    pub fn locate(&self) -> Option<PathBuf> {
        if let Some(binary) = &self.binary {
            return binary.is_file().then(|| binary.clone());
        }
        ["soffice", "libreoffice"]
            .into_iter()
            .find_map(process::resolve_program)
            .or_else(|| {
                KNOWN_INSTALLS
                    .iter()
                    .map(PathBuf::from)
                    .find(|path| path.is_file())
            })
    }

    fn command(binary: &Path, profile: &Path) -> Command {
        let mut cmd = Command::new(binary);
        cmd.arg(format!("-env:UserInstallation={}", file_url(profile)))
            .arg("--headless")
            .arg("--norestore")
            .arg("--nologo")
            .arg("--nodefault");
        cmd
    }

    async fn convert(
        &self,
        binary: &Path,
        profile: &Path,
        input: &Path,
        filter: &str,
        out_dir: &Path,
    ) -> Result<(), CalculationError> {
        let mut cmd = Self::command(binary, profile);
        cmd.arg("--convert-to").arg(filter).arg("--outdir").arg(out_dir).arg(input);
        let output = process::run(cmd, self.timeout).await?;
        process::check_status("soffice --convert-to", &output)
    }
}

/// Seed a private profile with the recalculation settings and macro
async fn prepare_profile(profile: &Path) -> Result<(), CalculationError> {
    let user = profile.join("user");
    let standard = user.join("basic").join("Standard");
    tokio::fs::create_dir_all(&standard)
        .await
        .map_err(|e| CalculationError::Io(e.to_string()))?;
    process::write_file(&user.join("registrymodifications.xcu"), REGISTRY.as_bytes()).await?;
    process::write_file(&user.join("basic").join("script.xlc"), BASIC_LIBRARIES.as_bytes()).await?;
    process::write_file(&standard.join("script.xlb"), BASIC_LIBRARY.as_bytes()).await?;
    process::write_file(&standard.join("Recalc.xba"), BASIC_MODULE.as_bytes()).await
}

fn file_url(path: &Path) -> String {
    let text = path.to_string_lossy().replace('\\', "/");
    if text.starts_with('/') {
        format!("file://{text}")
    } else {
        format!("file:///{text}")
    }
}

#[async_trait]
impl CalculationBackend for HeadlessOfficeBackend {
    fn method(&self) -> CalculationMethod {
        CalculationMethod::HeadlessOffice
    }

    async fn is_available(&self) -> bool {
        self.locate().is_some()
    }

    async fn calculate(
        &self,
        workbook: &[u8],
        _context: &CalculationContext,
    ) -> Result<Vec<u8>, CalculationError> {
        let binary = self
            .locate()
            .ok_or_else(|| CalculationError::Unavailable("LibreOffice (soffice) not found".to_string()))?;

        let dir = process::temp_dir()?;
        let profile = dir.path().join("profile");
        let ods_dir = dir.path().join("ods");
        let out_dir = dir.path().join("out");
        prepare_profile(&profile).await?;

        let input = dir.path().join("rater.xlsx");
        process::write_file(&input, workbook).await?;

        info!("Recalculating rater with {}", binary.display());
        self.convert(&binary, &profile, &input, "ods:calc8", &ods_dir).await?;
        let ods = ods_dir.join("rater.ods");

        // The conversions already recalculate on load; a failed macro run is tolerated
        let mut cmd = Self::command(&binary, &profile);
        cmd.arg(format!(
            "macro:///Standard.Recalc.CalculateAll(\"{}\")",
            file_url(&ods)
        ));
        match process::run(cmd, self.timeout).await {
            Ok(output) if output.status.success() => {}
            Ok(output) => warn!("Recalculation macro exited with {}", output.status),
            Err(e) => warn!("Recalculation macro did not run: {}", e),
        }

        self.convert(&binary, &profile, &ods, "xlsx:Calc MS Excel 2007 XML", &out_dir)
            .await?;
        process::read_file(&out_dir.join("rater.xlsx")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_url() {
        assert_eq!(file_url(Path::new("/tmp/x/profile")), "file:///tmp/x/profile");
        assert_eq!(file_url(Path::new(r"C:\Temp\profile")), "file:///C:/Temp/profile");
    }

    #[tokio::test]
    async fn test_missing_configured_binary_is_unavailable() {
        let backend = HeadlessOfficeBackend::new(Some(PathBuf::from("/no/such/soffice")));
        assert!(!backend.is_available().await);
        assert!(matches!(
            backend.calculate(b"x", &CalculationContext::default()).await,
            Err(CalculationError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_prepare_profile_writes_macro() {
        let dir = tempfile::tempdir().unwrap();
        prepare_profile(dir.path()).await.unwrap();
        let module =
            std::fs::read_to_string(dir.path().join("user/basic/Standard/Recalc.xba")).unwrap();
        assert!(module.contains("calculateAll()"));
        assert!(dir.path().join("user/registrymodifications.xcu").is_file());
    }
}
