//! Flashing pipeline
//!
//! Programs a signed image and its TOC package into MRAM, either over the
//! serial bootloader (ISP, `app-write-mram`) or through a J-Link probe
//! (JTAG). The sequence is fixed:
//!
//! 1. check the artifacts and resolve both addresses from the package map,
//! 2. select the serial port and write it into the ISP tool's config,
//! 3. verify the connected device (ISP, unless disabled),
//! 4. stage the artifacts into the toolkit and update the ARM-DS script,
//! 5. erase the application region (opt-in, failure only warns),
//! 6. program.
//!
//! Nothing is written to the device before step 5, so an address or
//! identity problem always aborts with the device untouched.

use std::fmt;
use std::fs;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use regex::Regex;

use super::device_sync;
use super::map_file::{FlashAddresses, PackageMap};
use super::selector::Selector;
use super::tool_config::ToolConfig;
use crate::config::defaults;
use crate::error::{FlashError, ToolError};
use crate::infra::filesystem;
use crate::infra::process::ToolCommand;
use crate::infra::serial::{PortInfo, PortLister};

/// Programming method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlashMethod {
    /// Serial bootloader via `app-write-mram`
    #[default]
    Isp,
    /// J-Link debug probe
    Jtag,
}

impl FromStr for FlashMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ISP" => Ok(Self::Isp),
            "JTAG" => Ok(Self::Jtag),
            other => Err(format!("unknown method '{other}', expected ISP or JTAG")),
        }
    }
}

impl fmt::Display for FlashMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Isp => write!(f, "ISP"),
            Self::Jtag => write!(f, "JTAG"),
        }
    }
}

/// Ports whose names look like a debug adapter, or every port when none do
pub fn port_candidates(ports: &[PortInfo]) -> Vec<PortInfo> {
    let adapters: Vec<PortInfo> = ports
        .iter()
        .filter(|p| {
            let name = p.name.to_lowercase();
            defaults::PORT_PATTERNS.iter().any(|pat| name.contains(pat))
        })
        .cloned()
        .collect();
    if adapters.is_empty() {
        ports.to_vec()
    } else {
        adapters
    }
}

/// Choose the serial port to program through
///
/// An explicit port is used as given. A single candidate is taken without
/// asking.
pub fn select_port(
    lister: &dyn PortLister,
    selector: &dyn Selector,
    explicit: Option<&str>,
) -> Result<String, FlashError> {
    if let Some(port) = explicit.filter(|p| !p.is_empty()) {
        return Ok(port.to_string());
    }

    let ports = lister.list()?;
    if ports.is_empty() {
        return Err(FlashError::NoPorts);
    }

    let candidates = port_candidates(&ports);
    if let [only] = candidates.as_slice() {
        tracing::info!("Auto-selected port {}", only.name);
        return Ok(only.name.clone());
    }

    let labels: Vec<String> = candidates.iter().map(PortInfo::describe).collect();
    let index = selector.select("serial port", &labels)?;
    Ok(candidates[index].name.clone())
}

/// Replace the `comport` line, appending one if absent
pub fn set_comport(content: &str, port: &str) -> String {
    let mut replaced = false;
    let mut lines: Vec<String> = content
        .split('\n')
        .map(|line| {
            if !replaced && line.trim_start().starts_with("comport") {
                replaced = true;
                format!("comport {port}")
            } else {
                line.to_string()
            }
        })
        .collect();
    if !replaced {
        if lines.last().is_some_and(String::is_empty) {
            lines.pop();
        }
        lines.push(format!("comport {port}"));
        lines.push(String::new());
    }
    lines.join("\n")
}

/// Point the ISP tool at `port`
pub fn update_isp_config(toolkit: &Path, port: &str) -> Result<(), FlashError> {
    let path = toolkit.join(defaults::ISP_CONFIG_FILE);
    let io_err = |e: std::io::Error| FlashError::IspConfig {
        path: path.clone(),
        error: e.to_string(),
    };
    let content = fs::read_to_string(&path).map_err(io_err)?;
    fs::write(&path, set_comport(&content, port)).map_err(io_err)?;
    tracing::debug!("Set comport {port} in {}", path.display());
    Ok(())
}

/// Identity reported by the connected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    /// Part number
    pub part: String,
    /// Silicon revision, if reported
    pub revision: Option<String>,
}

/// Queries the identity of the connected device
pub trait DeviceProbe {
    /// Read the connected device's identity
    fn identify(&self) -> impl Future<Output = Result<DeviceIdentity, FlashError>> + Send;
}

/// Extract the identity from the toolkit's SE banner
pub fn parse_identity(output: &str) -> Option<DeviceIdentity> {
    let part_re = Regex::new(r"(?i)part#?\s*(?:number)?\s*[:=]?\s*([A-Z0-9]{6,})").ok()?;
    let rev_re = Regex::new(r"(?i)rev(?:ision)?\s*[:=]?\s*([A-Z][0-9])\b").ok()?;

    let part = part_re.captures(output)?.get(1)?.as_str().to_string();
    let revision = rev_re
        .captures(output)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string());
    Some(DeviceIdentity { part, revision })
}

/// Probe via the toolkit's maintenance tool over the configured ISP port
#[derive(Debug, Clone)]
pub struct ToolkitProbe {
    toolkit: PathBuf,
    timeout: Duration,
}

impl ToolkitProbe {
    /// Create a probe for the toolkit at `toolkit`
    pub fn new(toolkit: &Path, timeout: Duration) -> Self {
        Self {
            toolkit: toolkit.to_path_buf(),
            timeout,
        }
    }
}

impl DeviceProbe for ToolkitProbe {
    async fn identify(&self) -> Result<DeviceIdentity, FlashError> {
        let out = ToolCommand::new(self.toolkit.join(defaults::MAINTENANCE_TOOL), self.timeout)
            .args(["-opt", defaults::PROBE_OPTION])
            .current_dir(&self.toolkit)
            .run()
            .await
            .map_err(|source| FlashError::Tool {
                stage: "Device query",
                source,
            })?;
        parse_identity(&out.output).ok_or(FlashError::ProbeUnreadable { output: out.output })
    }
}

/// Part number the connected device must report
///
/// A part-qualified target (`PART:CORE`) names it directly; otherwise the
/// part the toolkit is configured for is used.
pub fn expected_part(toolkit: &Path, target_core: Option<&str>) -> Result<String, FlashError> {
    let target = target_core.unwrap_or_default();
    if target.contains(':') {
        let part = device_sync::part_identifier(target);
        if !part.is_empty() {
            return Ok(part.to_string());
        }
    }
    device_sync::current_device(toolkit)
        .ok()
        .and_then(|d| d.part)
        .ok_or_else(|| FlashError::UnknownExpectedDevice {
            target: target.to_string(),
        })
}

/// Compare the probed identity with the expected part
///
/// The reported part must contain the expected one; a shorter report that
/// is only a prefix of it does not pass.
pub fn check_identity(expected: &str, actual: &DeviceIdentity) -> Result<(), FlashError> {
    let e = expected.to_lowercase();
    let a = actual.part.to_lowercase();
    if !e.is_empty() && a.contains(&e) {
        Ok(())
    } else {
        Err(FlashError::SafetyViolation {
            expected: expected.to_string(),
            actual: actual.part.clone(),
        })
    }
}

/// Rewrite the first line of the ARM-DS loader script
///
/// Returns `false` when the toolkit has no such script.
pub fn update_ds_script(toolkit: &Path, addrs: &FlashAddresses) -> Result<bool, FlashError> {
    let path = toolkit.join(defaults::DS_SCRIPT);
    if !path.is_file() {
        tracing::debug!("No ARM-DS script at {}", path.display());
        return Ok(false);
    }
    let io_err = |e: std::io::Error| FlashError::Io {
        path: path.clone(),
        error: e.to_string(),
    };
    let content = fs::read_to_string(&path).map_err(io_err)?;
    let first = format!(
        "set semihosting args ../build/images/{} {} ../{} {}",
        defaults::SIGNED_IMAGE_FILE,
        addrs.image,
        defaults::TOC_FILE,
        addrs.toc
    );
    let rest = content.split_once('\n').map(|(_, rest)| rest);
    let updated = match rest {
        Some(rest) => format!("{first}\n{rest}"),
        None => first,
    };
    fs::write(&path, updated).map_err(io_err)?;
    Ok(true)
}

/// J-Link command script loading image and TOC
pub fn jlink_flash_script(image: &Path, toc: &Path, addrs: &FlashAddresses) -> String {
    format!(
        "si SWD\nspeed 4000\ndevice Cortex-M55\nconnect\nloadbin {} {}\nloadbin {} {}\nr\ng\nqc\n",
        image.display(),
        addrs.image,
        toc.display(),
        addrs.toc
    )
}

/// Name of the J-Link commander on this platform
pub fn jlink_program() -> &'static str {
    if cfg!(windows) {
        "JLink.exe"
    } else {
        defaults::JLINK_TOOL
    }
}

/// What to program
#[derive(Debug, Clone)]
pub struct FlashTarget {
    /// Signed image (`alif-img.bin`)
    pub signed_image: PathBuf,
    /// TOC package
    pub toc: PathBuf,
    /// Resolved target, used for verification
    pub target_core: Option<String>,
    /// Names the image may appear under in the package map
    pub image_names: Vec<String>,
}

impl FlashTarget {
    /// Target whose artifacts sit next to the TOC package
    pub fn from_toc(toc: &Path, target_core: Option<&str>) -> Self {
        let dir = toc.parent().unwrap_or_else(|| Path::new("."));
        Self {
            signed_image: dir.join(defaults::SIGNED_IMAGE_FILE),
            toc: toc.to_path_buf(),
            target_core: target_core.map(str::to_string),
            image_names: vec![defaults::SIGNED_IMAGE_FILE.to_string()],
        }
    }

    /// Also accept `name` as the image's entry in the package map
    #[must_use]
    pub fn with_image_name(mut self, name: &str) -> Self {
        if !name.is_empty() && !self.image_names.iter().any(|n| n == name) {
            self.image_names.push(name.to_string());
        }
        self
    }

    fn build_dir(&self) -> &Path {
        self.toc.parent().unwrap_or_else(|| Path::new("."))
    }
}

/// How to program
#[derive(Debug, Clone, Default)]
pub struct FlashOptions {
    /// ISP or JTAG
    pub method: FlashMethod,
    /// Erase the application region first
    pub erase: bool,
    /// Verify the connected device (ISP only)
    pub verify: bool,
    /// Disable baud-rate switching
    pub slow: bool,
    /// Pass `-v` to the ISP tool and keep its output
    pub verbose: bool,
    /// Port to use instead of detecting one
    pub port: Option<String>,
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageStatus {
    /// Ran and succeeded
    Passed,
    /// Not run
    Skipped(String),
    /// Failed but optional; execution continued
    Warned(String),
}

/// One line of the flash report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    /// Stage name
    pub stage: &'static str,
    /// Outcome
    pub status: StageStatus,
}

/// Result of a successful flash
#[derive(Debug, Clone)]
pub struct FlashReport {
    /// Method used
    pub method: FlashMethod,
    /// Serial port used (ISP)
    pub port: Option<String>,
    /// Addresses programmed
    pub addresses: FlashAddresses,
    /// Probed identity, when verified
    pub device: Option<DeviceIdentity>,
    /// Stage outcomes in order
    pub stages: Vec<StageReport>,
    /// Programming tool output, kept when verbose
    pub tool_output: Option<String>,
}

impl FlashReport {
    fn push(&mut self, stage: &'static str, status: StageStatus) {
        self.stages.push(StageReport { stage, status });
    }
}

/// Drives one flash session against a toolkit installation
pub struct Flasher<'a, P: DeviceProbe> {
    toolkit: PathBuf,
    timeout: Duration,
    ports: &'a dyn PortLister,
    selector: &'a dyn Selector,
    probe: P,
}

impl<'a, P: DeviceProbe> Flasher<'a, P> {
    /// Create a flasher for the configured toolkit
    pub fn new(
        config: &ToolConfig,
        ports: &'a dyn PortLister,
        selector: &'a dyn Selector,
        probe: P,
    ) -> Result<Self, crate::core::tool_config::ToolConfigError> {
        Ok(Self {
            toolkit: config.toolkit()?.to_path_buf(),
            timeout: config.flash_timeout(),
            ports,
            selector,
            probe,
        })
    }

    /// Package map written next to `target` when it was signed
    ///
    /// The toolkit's own copy belongs to whatever was signed last and is
    /// never consulted.
    fn load_map(target: &FlashTarget) -> Result<PackageMap, FlashError> {
        let path = target.build_dir().join(defaults::PACKAGE_MAP_FILE);
        Ok(PackageMap::from_path(&path)?)
    }

    /// Resolve load and TOC addresses for `target`
    pub fn resolve_addresses(&self, target: &FlashTarget) -> Result<FlashAddresses, FlashError> {
        let names: Vec<&str> = target.image_names.iter().map(String::as_str).collect();
        Ok(Self::load_map(target)?.flash_addresses(&names)?)
    }

    fn stage_into_toolkit(&self, target: &FlashTarget) -> Result<(), FlashError> {
        let groups = [
            (&target.signed_image, defaults::TOOLKIT_IMAGES_DIR),
            (&target.toc, defaults::TOOLKIT_BUILD_DIR),
        ];
        for (primary, dest_dir) in groups {
            let dest_dir = self.toolkit.join(dest_dir);
            let mut files = vec![primary.clone()];
            for ext in defaults::SIDECAR_EXTENSIONS {
                let mut sidecar = primary.as_os_str().to_os_string();
                sidecar.push(format!(".{ext}"));
                files.push(PathBuf::from(sidecar));
            }
            for file in files.iter().filter(|f| f.is_file()) {
                let Some(name) = file.file_name() else {
                    continue;
                };
                let dest = dest_dir.join(name);
                filesystem::copy_file(file, &dest).map_err(|e| FlashError::Io {
                    path: dest.clone(),
                    error: e.to_string(),
                })?;
            }
        }
        Ok(())
    }

    fn write_mram(&self) -> ToolCommand {
        ToolCommand::new(self.toolkit.join(defaults::WRITE_MRAM_TOOL), self.timeout)
            .current_dir(&self.toolkit)
    }

    async fn erase(&self, verbose: bool) -> Result<(), ToolError> {
        let mut cmd = self.write_mram().args(["-e", "APP"]);
        if verbose {
            cmd = cmd.arg("-v");
        }
        cmd.run().await.map(|_| ())
    }

    async fn program_isp(&self, options: &FlashOptions) -> Result<String, FlashError> {
        let mut cmd = self.write_mram().arg("-p");
        if options.slow {
            cmd = cmd.arg("-s");
        }
        if options.verbose {
            cmd = cmd.arg("-v");
        }
        cmd.run()
            .await
            .map(|o| o.output)
            .map_err(|source| FlashError::Tool {
                stage: "Program",
                source,
            })
    }

    async fn program_jtag(
        &self,
        target: &FlashTarget,
        addrs: &FlashAddresses,
    ) -> Result<String, FlashError> {
        let script = target.build_dir().join(defaults::JLINK_FLASH_SCRIPT);
        let content = jlink_flash_script(&target.signed_image, &target.toc, addrs);
        filesystem::write_file(&script, &content).map_err(|e| FlashError::Io {
            path: script.clone(),
            error: e.to_string(),
        })?;

        ToolCommand::new(jlink_program(), self.timeout)
            .arg("-CommandFile")
            .arg(&script)
            .run()
            .await
            .map(|o| o.output)
            .map_err(|source| FlashError::Tool {
                stage: "Program",
                source,
            })
    }

    /// Run the whole pipeline
    pub async fn flash(
        &self,
        target: &FlashTarget,
        options: &FlashOptions,
    ) -> Result<FlashReport, FlashError> {
        for file in [&target.signed_image, &target.toc] {
            if !file.is_file() {
                return Err(FlashError::MissingArtifact { path: file.clone() });
            }
        }

        let addresses = self.resolve_addresses(target)?;
        tracing::info!(
            "Image at {}, TOC at {} ({})",
            addresses.image,
            addresses.toc,
            options.method
        );

        let mut report = FlashReport {
            method: options.method,
            port: None,
            addresses: addresses.clone(),
            device: None,
            stages: Vec::new(),
            tool_output: None,
        };

        if options.method == FlashMethod::Isp {
            let port = select_port(self.ports, self.selector, options.port.as_deref())?;
            update_isp_config(&self.toolkit, &port)?;
            report.port = Some(port);

            if options.verify {
                let expected = expected_part(&self.toolkit, target.target_core.as_deref())?;
                let actual = self.probe.identify().await?;
                check_identity(&expected, &actual)?;
                report.device = Some(actual);
                report.push("Verify", StageStatus::Passed);
            } else {
                report.push("Verify", StageStatus::Skipped("disabled".to_string()));
            }
        } else {
            report.push("Verify", StageStatus::Skipped("JTAG".to_string()));
        }

        self.stage_into_toolkit(target)?;
        if !update_ds_script(&self.toolkit, &addresses)? {
            tracing::debug!("ARM-DS script not updated");
        }

        match (options.erase, options.method) {
            (false, _) => report.push("Erase", StageStatus::Skipped("not requested".to_string())),
            (true, FlashMethod::Jtag) => {
                tracing::warn!("Erase is only available over ISP; skipping");
                report.push(
                    "Erase",
                    StageStatus::Skipped("not available over JTAG".to_string()),
                );
            }
            (true, FlashMethod::Isp) => match self.erase(options.verbose).await {
                Ok(()) => report.push("Erase", StageStatus::Passed),
                Err(e) => {
                    let detail = e.to_string();
                    tracing::warn!("Erase failed, continuing: {detail}");
                    report.push("Erase", StageStatus::Warned(detail));
                }
            },
        }

        let output = match options.method {
            FlashMethod::Isp => self.program_isp(options).await?,
            FlashMethod::Jtag => self.program_jtag(target, &addresses).await?,
        };
        report.push("Program", StageStatus::Passed);
        if options.verbose {
            report.tool_output = Some(output);
        }

        Ok(report)
    }
}
