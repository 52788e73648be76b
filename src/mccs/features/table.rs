//! Built in VCP feature table.

use super::{Access, FeatureKind, FeatureTableEntry, NonTableFormat, SlValue, VersionFeature};

use super::Access::{ReadOnly as RO, ReadWrite as RW, WriteOnly as WO};

const fn continuous(access: Access) -> Option<VersionFeature> {
    Some(VersionFeature {
        kind: FeatureKind::Continuous,
        access,
        sl_values: None,
        format: NonTableFormat::Standard,
    })
}

const fn simple(access: Access, sl_values: Option<&'static [SlValue]>) -> Option<VersionFeature> {
    Some(VersionFeature {
        kind: FeatureKind::SimpleNonContinuous,
        access,
        sl_values,
        format: NonTableFormat::Standard,
    })
}

const fn complex(
    access: Access,
    sl_values: Option<&'static [SlValue]>,
    format: NonTableFormat,
) -> Option<VersionFeature> {
    Some(VersionFeature {
        kind: FeatureKind::ComplexNonContinuous,
        access,
        sl_values,
        format,
    })
}

const fn table(access: Access) -> Option<VersionFeature> {
    Some(VersionFeature {
        kind: FeatureKind::Table,
        access,
        sl_values: None,
        format: NonTableFormat::Standard,
    })
}

/// Entry that means the same thing in every version.
const fn entry(code: u8, name: &'static str, v20: Option<VersionFeature>) -> FeatureTableEntry {
    FeatureTableEntry {
        code,
        name,
        v20,
        v21: None,
        v30: None,
        v22: None,
    }
}

const NEW_CONTROL_VALUES: &[SlValue] = &[
    SlValue::new(0x01, "No new control values"),
    SlValue::new(0x02, "One or more new control values have been saved"),
    SlValue::new(0xff, "No user controls are present"),
];

const SOFT_CONTROLS: &[SlValue] = &[
    SlValue::new(0x00, "No button active"),
    SlValue::new(0x01, "Button 1 active"),
    SlValue::new(0x02, "Button 2 active"),
    SlValue::new(0x03, "Button 3 active"),
    SlValue::new(0x04, "Button 4 active"),
    SlValue::new(0x05, "Button 5 active"),
    SlValue::new(0x06, "Button 6 active"),
    SlValue::new(0x07, "Button 7 active"),
    SlValue::new(0xff, "No user controls are present"),
];

const COLOR_PRESETS: &[SlValue] = &[
    SlValue::new(0x01, "sRGB"),
    SlValue::new(0x02, "Display Native"),
    SlValue::new(0x03, "4000 K"),
    SlValue::new(0x04, "5000 K"),
    SlValue::new(0x05, "6500 K"),
    SlValue::new(0x06, "7500 K"),
    SlValue::new(0x07, "8200 K"),
    SlValue::new(0x08, "9300 K"),
    SlValue::new(0x09, "10000 K"),
    SlValue::new(0x0a, "11500 K"),
    SlValue::new(0x0b, "User 1"),
    SlValue::new(0x0c, "User 2"),
    SlValue::new(0x0d, "User 3"),
];

const AUTO_SETUP: &[SlValue] = &[
    SlValue::new(0x00, "Auto setup not active"),
    SlValue::new(0x01, "Performing auto setup"),
    SlValue::new(0x02, "Enable continuous/periodic auto setup"),
];

const INPUT_SOURCES: &[SlValue] = &[
    SlValue::new(0x01, "VGA-1"),
    SlValue::new(0x02, "VGA-2"),
    SlValue::new(0x03, "DVI-1"),
    SlValue::new(0x04, "DVI-2"),
    SlValue::new(0x05, "Composite video 1"),
    SlValue::new(0x06, "Composite video 2"),
    SlValue::new(0x07, "S-Video-1"),
    SlValue::new(0x08, "S-Video-2"),
    SlValue::new(0x09, "Tuner-1"),
    SlValue::new(0x0a, "Tuner-2"),
    SlValue::new(0x0b, "Tuner-3"),
    SlValue::new(0x0c, "Component video (YPrPb/YCrCb) 1"),
    SlValue::new(0x0d, "Component video (YPrPb/YCrCb) 2"),
    SlValue::new(0x0e, "Component video (YPrPb/YCrCb) 3"),
    SlValue::new(0x0f, "DisplayPort-1"),
    SlValue::new(0x10, "DisplayPort-2"),
    SlValue::new(0x11, "HDMI-1"),
    SlValue::new(0x12, "HDMI-2"),
];

const AUDIO_MUTE: &[SlValue] = &[
    SlValue::new(0x01, "Mute the audio"),
    SlValue::new(0x02, "Unmute the audio"),
];

const ORIENTATIONS: &[SlValue] = &[
    SlValue::new(0x01, "0 degrees"),
    SlValue::new(0x02, "90 degrees"),
    SlValue::new(0x03, "180 degrees"),
    SlValue::new(0x04, "270 degrees"),
    SlValue::new(0xff, "Display cannot supply orientation"),
];

const SETTINGS: &[SlValue] = &[
    SlValue::new(0x01, "Store current settings in the monitor"),
    SlValue::new(0x02, "Restore factory defaults for current mode"),
];

const SUBPIXEL_LAYOUTS: &[SlValue] = &[
    SlValue::new(0x00, "Sub-pixel layout not defined"),
    SlValue::new(0x01, "Red/Green/Blue vertical stripe"),
    SlValue::new(0x02, "Red/Green/Blue horizontal stripe"),
    SlValue::new(0x03, "Blue/Green/Red vertical stripe"),
    SlValue::new(0x04, "Blue/Green/Red horizontal stripe"),
    SlValue::new(0x05, "Quad-pixel, red at top left"),
    SlValue::new(0x06, "Quad-pixel, red at bottom left"),
    SlValue::new(0x07, "Delta (triad)"),
    SlValue::new(0x08, "Mosaic"),
];

const DISPLAY_TECHNOLOGIES: &[SlValue] = &[
    SlValue::new(0x01, "CRT (shadow mask)"),
    SlValue::new(0x02, "CRT (aperture grill)"),
    SlValue::new(0x03, "LCD (active matrix)"),
    SlValue::new(0x04, "LCos"),
    SlValue::new(0x05, "Plasma"),
    SlValue::new(0x06, "OLED"),
    SlValue::new(0x07, "EL"),
    SlValue::new(0x08, "Dynamic MEM"),
    SlValue::new(0x09, "Static MEM"),
];

const CONTROLLER_MANUFACTURERS: &[SlValue] = &[
    SlValue::new(0x01, "Conexant"),
    SlValue::new(0x02, "Genesis"),
    SlValue::new(0x03, "Macronix"),
    SlValue::new(0x04, "IDT"),
    SlValue::new(0x05, "Mstar"),
    SlValue::new(0x06, "Myson"),
    SlValue::new(0x07, "Phillips"),
    SlValue::new(0x08, "PixelWorks"),
    SlValue::new(0x09, "RealTek"),
    SlValue::new(0x0a, "Sage"),
    SlValue::new(0x0b, "Silicon Image"),
    SlValue::new(0x0c, "SmartASIC"),
    SlValue::new(0x0d, "STMicroelectronics"),
    SlValue::new(0x0e, "Topro"),
    SlValue::new(0x0f, "Trumpion"),
    SlValue::new(0x10, "Welltrend"),
    SlValue::new(0x11, "Samsung"),
    SlValue::new(0x12, "Novatek"),
    SlValue::new(0x13, "STK"),
    SlValue::new(0x14, "Silicon Optics"),
    SlValue::new(0x15, "Texas Instruments"),
    SlValue::new(0x16, "Analogix"),
    SlValue::new(0x17, "Quantum Data"),
    SlValue::new(0x18, "NXP Semiconductors"),
    SlValue::new(0x19, "Chrontel"),
    SlValue::new(0x1a, "Parade Technologies"),
    SlValue::new(0x1b, "THine Electronics"),
    SlValue::new(0x1c, "Trident"),
    SlValue::new(0x1d, "Micros"),
    SlValue::new(0xff, "Not defined - a manufacturer designed controller"),
];

const OSD_V20: &[SlValue] = &[
    SlValue::new(0x01, "OSD Disabled"),
    SlValue::new(0x02, "OSD Enabled"),
    SlValue::new(0xff, "Display cannot supply this information"),
];

/// 2.2 and 3.0 extend the OSD control with button events.
const OSD_BUTTON_CONTROL: &[SlValue] = &[
    SlValue::new(0x00, "Reserved value, must be ignored"),
    SlValue::new(0x01, "OSD disabled, button events enabled"),
    SlValue::new(0x02, "OSD enabled, button events enabled"),
    SlValue::new(0x03, "OSD disabled, button events disabled"),
    SlValue::new(0xff, "Display cannot supply this information"),
];

const OSD_LANGUAGES: &[SlValue] = &[
    SlValue::new(0x00, "Reserved value, must be ignored"),
    SlValue::new(0x01, "Chinese (traditional, Hantai)"),
    SlValue::new(0x02, "English"),
    SlValue::new(0x03, "French"),
    SlValue::new(0x04, "German"),
    SlValue::new(0x05, "Italian"),
    SlValue::new(0x06, "Japanese"),
    SlValue::new(0x07, "Korean"),
    SlValue::new(0x08, "Portuguese (Portugal)"),
    SlValue::new(0x09, "Russian"),
    SlValue::new(0x0a, "Spanish"),
    SlValue::new(0x0b, "Swedish"),
    SlValue::new(0x0c, "Turkish"),
    SlValue::new(0x0d, "Chinese (simplified / Kantai)"),
    SlValue::new(0x0e, "Portuguese (Brazil)"),
    SlValue::new(0x0f, "Arabic"),
    SlValue::new(0x10, "Bulgarian"),
    SlValue::new(0x11, "Croatian"),
    SlValue::new(0x12, "Czech"),
    SlValue::new(0x13, "Danish"),
    SlValue::new(0x14, "Dutch"),
    SlValue::new(0x15, "Estonian"),
    SlValue::new(0x16, "Finnish"),
    SlValue::new(0x17, "Greek"),
    SlValue::new(0x18, "Hebrew"),
    SlValue::new(0x19, "Hindi"),
    SlValue::new(0x1a, "Hungarian"),
    SlValue::new(0x1b, "Latvian"),
    SlValue::new(0x1c, "Lithuanian"),
    SlValue::new(0x1d, "Norwegian"),
    SlValue::new(0x1e, "Polish"),
    SlValue::new(0x1f, "Romanian"),
    SlValue::new(0x20, "Serbian"),
    SlValue::new(0x21, "Slovak"),
    SlValue::new(0x22, "Slovenian"),
    SlValue::new(0x23, "Thai"),
    SlValue::new(0x24, "Ukranian"),
    SlValue::new(0x25, "Vietnamese"),
];

const POWER_MODES: &[SlValue] = &[
    SlValue::new(0x01, "DPM: On,  DPMS: Off"),
    SlValue::new(0x02, "DPM: Off, DPMS: Standby"),
    SlValue::new(0x03, "DPM: Off, DPMS: Suspend"),
    SlValue::new(0x04, "DPM: Off, DPMS: Off"),
    SlValue::new(0x05, "Write only value to turn off display"),
];

const DISPLAY_MODES: &[SlValue] = &[
    SlValue::new(0x00, "Standard/Default mode"),
    SlValue::new(0x01, "Productivity"),
    SlValue::new(0x02, "Mixed"),
    SlValue::new(0x03, "Movie"),
    SlValue::new(0x04, "User defined"),
    SlValue::new(0x05, "Games"),
    SlValue::new(0x06, "Sports"),
    SlValue::new(0x07, "Professional (all signal processing disabled)"),
    SlValue::new(0x08, "Standard/Default mode with intermediate power consumption"),
    SlValue::new(0x09, "Standard/Default mode with low power consumption"),
    SlValue::new(0x0a, "Demonstration"),
    SlValue::new(0xf0, "Dynamic contrast"),
];

/// Sorted by feature code.
pub static FEATURE_TABLE: &[FeatureTableEntry] = &[
    entry(0x01, "Degauss", simple(WO, None)),
    entry(0x02, "New control value", simple(RW, Some(NEW_CONTROL_VALUES))),
    entry(0x03, "Soft controls", simple(RW, Some(SOFT_CONTROLS))),
    entry(0x04, "Restore factory defaults", simple(WO, None)),
    entry(0x05, "Restore factory brightness/contrast defaults", simple(WO, None)),
    entry(0x06, "Restore factory geometry defaults", simple(WO, None)),
    entry(0x08, "Restore color defaults", simple(WO, None)),
    entry(0x0a, "Restore factory TV defaults", simple(WO, None)),
    entry(0x0b, "Color temperature increment", complex(RO, None, NonTableFormat::Word)),
    entry(0x0c, "Color temperature request", continuous(RW)),
    entry(0x0e, "Clock", continuous(RW)),
    entry(0x10, "Brightness", continuous(RW)),
    FeatureTableEntry {
        code: 0x11,
        name: "Flesh tone enhancement",
        v20: None,
        v21: None,
        v30: complex(RW, None, NonTableFormat::Standard),
        v22: complex(RW, None, NonTableFormat::Standard),
    },
    entry(0x12, "Contrast", continuous(RW)),
    entry(0x13, "Backlight control", continuous(RW)),
    FeatureTableEntry {
        code: 0x14,
        name: "Select color preset",
        v20: simple(RW, Some(COLOR_PRESETS)),
        v21: None,
        // MH carries the color temperature tolerance
        v30: complex(RW, Some(COLOR_PRESETS), NonTableFormat::Standard),
        v22: simple(RW, Some(COLOR_PRESETS)),
    },
    entry(0x16, "Video gain: Red", continuous(RW)),
    entry(0x18, "Video gain: Green", continuous(RW)),
    entry(0x1a, "Video gain: Blue", continuous(RW)),
    entry(0x1e, "Auto setup", simple(RW, Some(AUTO_SETUP))),
    entry(0x1f, "Auto color setup", simple(RW, Some(AUTO_SETUP))),
    entry(0x20, "Horizontal Position (Phase)", continuous(RW)),
    entry(0x30, "Vertical Position (Phase)", continuous(RW)),
    entry(0x52, "Active control", complex(RO, None, NonTableFormat::Standard)),
    FeatureTableEntry {
        code: 0x60,
        name: "Input Source",
        v20: simple(RW, Some(INPUT_SOURCES)),
        v21: None,
        v30: table(RW),
        v22: simple(RW, Some(INPUT_SOURCES)),
    },
    entry(0x62, "Audio speaker volume", continuous(RW)),
    entry(0x6c, "Video black level: Red", continuous(RW)),
    entry(0x6e, "Video black level: Green", continuous(RW)),
    entry(0x70, "Video black level: Blue", continuous(RW)),
    FeatureTableEntry {
        code: 0x72,
        name: "Gamma",
        v20: None,
        v21: None,
        v30: None,
        v22: complex(RW, None, NonTableFormat::Standard),
    },
    entry(0x73, "LUT Size", table(RO)),
    entry(0x74, "Single point LUT operation", table(RW)),
    entry(0x75, "Block LUT operation", table(RW)),
    entry(0x87, "Sharpness", continuous(RW)),
    entry(0x8d, "Audio mute", simple(RW, Some(AUDIO_MUTE))),
    entry(0xaa, "Screen Orientation", simple(RO, Some(ORIENTATIONS))),
    entry(0xac, "Horizontal frequency", complex(RO, None, NonTableFormat::Standard)),
    entry(0xae, "Vertical frequency", complex(RO, None, NonTableFormat::Standard)),
    entry(0xb0, "Settings", simple(WO, Some(SETTINGS))),
    entry(0xb2, "Flat panel sub-pixel layout", simple(RO, Some(SUBPIXEL_LAYOUTS))),
    entry(0xb6, "Display technology type", simple(RO, Some(DISPLAY_TECHNOLOGIES))),
    entry(0xc0, "Display usage time", complex(RO, None, NonTableFormat::Hours)),
    entry(0xc6, "Application enable key", complex(RO, None, NonTableFormat::Word)),
    entry(
        0xc8,
        "Display controller type",
        complex(RW, Some(CONTROLLER_MANUFACTURERS), NonTableFormat::Standard),
    ),
    entry(0xc9, "Display firmware level", complex(RO, None, NonTableFormat::Version)),
    FeatureTableEntry {
        code: 0xca,
        name: "OSD",
        v20: simple(RW, Some(OSD_V20)),
        v21: None,
        v30: simple(RW, Some(OSD_BUTTON_CONTROL)),
        v22: simple(RW, Some(OSD_BUTTON_CONTROL)),
    },
    entry(0xcc, "OSD Language", simple(RW, Some(OSD_LANGUAGES))),
    entry(0xd6, "Power mode", simple(RW, Some(POWER_MODES))),
    entry(0xdc, "Display Mode", simple(RW, Some(DISPLAY_MODES))),
    entry(0xdf, "VCP Version", complex(RO, None, NonTableFormat::Version)),
];

pub fn find_feature(code: u8) -> Option<&'static FeatureTableEntry> {
    FEATURE_TABLE
        .binary_search_by_key(&code, |entry| entry.code)
        .ok()
        .map(|index| &FEATURE_TABLE[index])
}
