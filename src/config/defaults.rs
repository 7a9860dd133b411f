//! Default configuration values and toolkit layout conventions

/// Default timeout for a `cbuild` invocation (in seconds)
pub const BUILD_TIMEOUT_SECS: u64 = 1800;

/// Default timeout for signing and context listing (in seconds)
pub const SIGN_TIMEOUT_SECS: u64 = 300;

/// Default timeout for erase, verify and program steps (in seconds)
pub const FLASH_TIMEOUT_SECS: u64 = 600;

/// Suffix of the CMSIS solution descriptor
pub const SOLUTION_SUFFIX: &str = ".csolution.yml";

/// Suffix of the per-context build output descriptor
pub const CBUILD_SUFFIX: &str = ".cbuild.yml";

/// Directories never descended into when looking for build descriptors
pub const DESCRIPTOR_SKIP_DIRS: &[&str] = &[".git", "packs", "tools", "node_modules", "out", "tmp"];

/// Project-local hidden configuration directory
pub const LOCAL_CONFIG_DIR: &str = ".alif";

/// Sidecar file persisting the outcome of the last build
pub const BUILD_STATE_FILE: &str = ".alif_build_state";

/// Name of the TOC package produced by `app-gen-toc`
pub const TOC_FILE: &str = "AppTocPackage.bin";

/// Name the signed application image is retrieved under
pub const SIGNED_IMAGE_FILE: &str = "alif-img.bin";

/// Package map written by `app-gen-toc`
pub const PACKAGE_MAP_FILE: &str = "app-package-map.txt";

/// Extensions of the signature and certificate emitted next to an artifact
pub const SIDECAR_EXTENSIONS: &[&str] = &["sign", "crt"];

/// Name the resolved signing config is staged under in the toolkit root
pub const STAGED_CONFIG_FILE: &str = "alif-staged-config.json";

/// Toolkit-relative output directory of `app-gen-toc`
pub const TOOLKIT_BUILD_DIR: &str = "build";

/// Toolkit-relative images directory
pub const TOOLKIT_IMAGES_DIR: &str = "build/images";

/// Toolkit-relative device database
pub const DEVICE_DB: &str = "utils/devicesDB.db";

/// Toolkit-relative feature database
pub const FEATURE_DB: &str = "utils/featuresDB.db";

/// Toolkit-relative global device configuration
pub const GLOBAL_CFG_DB: &str = "utils/global-cfg.db";

/// Toolkit-relative ISP tool configuration
pub const ISP_CONFIG_FILE: &str = "isp_config_data.cfg";

/// Toolkit-relative ARM-DS loader script
pub const DS_SCRIPT: &str = "bin/application_package.ds";

/// Revision written when neither the current nor any listed revision applies
pub const FALLBACK_REVISION: &str = "B4";

/// Marker of the TOC address line in the package map
pub const PACKAGE_START_MARKER: &str = "package start address";

/// Signing tool
pub const GEN_TOC_TOOL: &str = "app-gen-toc";

/// ISP programming tool
pub const WRITE_MRAM_TOOL: &str = "app-write-mram";

/// Toolkit maintenance tool used to query the connected device
pub const MAINTENANCE_TOOL: &str = "maintenance";

/// Environment variable naming the GCC toolchain for CMSIS-Toolbox
pub const GCC_TOOLCHAIN_ENV: &str = "GCC_TOOLCHAIN_13_2_1";

/// Option making the maintenance tool print the SE banner and exit
pub const PROBE_OPTION: &str = "sesbanner";

/// SEGGER J-Link commander
pub const JLINK_TOOL: &str = "JLinkExe";

/// J-Link flash script written next to the signed image
pub const JLINK_FLASH_SCRIPT: &str = "flash_jlink.jlink";

/// J-Link recover script written to the working directory
pub const JLINK_RECOVER_SCRIPT: &str = "recover_jlink.jlink";

/// Optional project-local J-Link reset script used by recover
pub const JLINK_RESET_SCRIPT: &str = ".alif/E7_Series_Reset.jlinkscript";

/// Substrings identifying debug-adapter serial ports
pub const PORT_PATTERNS: &[&str] = &["usbmodem", "jlink", "mbed"];

/// Addresses cleared by recover in addition to discovered ones
pub const RECOVER_DEFAULT_ADDRESSES: &[&str] = &[
    "0x80000000",
    "0x80010000",
    "0x8057f0e0",
    "0x8057f0f0",
    "0x8057ff90",
    "0x8057bff0",
];

/// Words zeroed at each recover address
pub const RECOVER_WORDS: usize = 16;
