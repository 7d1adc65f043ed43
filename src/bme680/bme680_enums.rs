use std::fmt;

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Bme680DeviceAddress {
    #[default]
    Default,
    Secondary,
}

impl Bme680DeviceAddress {
    const BME680_DEV_ADDR_DEFAULT: u16 = 0x77;
    const BME680_DEV_ADDR_SECONDARY: u16 = 0x76;

    pub fn value(&self) -> u16 {
        match *self {
            Self::Default => Self::BME680_DEV_ADDR_DEFAULT,
            Self::Secondary => Self::BME680_DEV_ADDR_SECONDARY,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme680SensorPowerMode {
    Sleep,
    Forced,
}

impl Bme680SensorPowerMode {
    const BME680_POWERMODE_SLEEP: u8 = 0x00;
    const BME680_POWERMODE_FORCED: u8 = 0x01;

    pub fn value(&self) -> u8 {
        match *self {
            Self::Sleep => Self::BME680_POWERMODE_SLEEP,
            Self::Forced => Self::BME680_POWERMODE_FORCED,
        }
    }
}

impl fmt::Display for Bme680SensorPowerMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::Sleep => write!(f, "Sleep/{:#04x}", self.value()),
            Self::Forced => write!(f, "Forced/{:#04x}", self.value()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme680OverSampling {
    NoOversampling,
    Oversampling1x,
    Oversampling2x,
    Oversampling4x,
    Oversampling8x,
    Oversampling16x,
}

impl Bme680OverSampling {
    const BME680_NO_OVERSAMPLING: u8 = 0x00;
    const BME680_OVERSAMPLING_1X: u8 = 0x01;
    const BME680_OVERSAMPLING_2X: u8 = 0x02;
    const BME680_OVERSAMPLING_4X: u8 = 0x03;
    const BME680_OVERSAMPLING_8X: u8 = 0x04;
    const BME680_OVERSAMPLING_16X: u8 = 0x05;

    pub fn value(&self) -> u8 {
        match *self {
            Self::NoOversampling => Self::BME680_NO_OVERSAMPLING,
            Self::Oversampling1x => Self::BME680_OVERSAMPLING_1X,
            Self::Oversampling2x => Self::BME680_OVERSAMPLING_2X,
            Self::Oversampling4x => Self::BME680_OVERSAMPLING_4X,
            Self::Oversampling8x => Self::BME680_OVERSAMPLING_8X,
            Self::Oversampling16x => Self::BME680_OVERSAMPLING_16X,
        }
    }
}

impl fmt::Display for Bme680OverSampling {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::NoOversampling => write!(f, "NoOversampling/{:#04x}", self.value()),
            Self::Oversampling1x => write!(f, "Oversampling1x/{:#04x}", self.value()),
            Self::Oversampling2x => write!(f, "Oversampling2x/{:#04x}", self.value()),
            Self::Oversampling4x => write!(f, "Oversampling4x/{:#04x}", self.value()),
            Self::Oversampling8x => write!(f, "Oversampling8x/{:#04x}", self.value()),
            Self::Oversampling16x => write!(f, "Oversampling16x/{:#04x}", self.value()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme680IrrFilter {
    FilterOff,
    Coef1,
    Coef3,
    Coef7,
    Coef15,
    Coef31,
    Coef63,
    Coef127,
}

impl Bme680IrrFilter {
    const BME680_FILTER_COEFF_OFF: u8 = 0x00;
    const BME680_FILTER_COEFF_1: u8 = 0x01;
    const BME680_FILTER_COEFF_3: u8 = 0x02;
    const BME680_FILTER_COEFF_7: u8 = 0x03;
    const BME680_FILTER_COEFF_15: u8 = 0x04;
    const BME680_FILTER_COEFF_31: u8 = 0x05;
    const BME680_FILTER_COEFF_63: u8 = 0x06;
    const BME680_FILTER_COEFF_127: u8 = 0x07;

    pub fn value(&self) -> u8 {
        match *self {
            Self::FilterOff => Self::BME680_FILTER_COEFF_OFF,
            Self::Coef1 => Self::BME680_FILTER_COEFF_1,
            Self::Coef3 => Self::BME680_FILTER_COEFF_3,
            Self::Coef7 => Self::BME680_FILTER_COEFF_7,
            Self::Coef15 => Self::BME680_FILTER_COEFF_15,
            Self::Coef31 => Self::BME680_FILTER_COEFF_31,
            Self::Coef63 => Self::BME680_FILTER_COEFF_63,
            Self::Coef127 => Self::BME680_FILTER_COEFF_127,
        }
    }
}

impl fmt::Display for Bme680IrrFilter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::FilterOff => write!(f, "FilterOff/{:#04x}", self.value()),
            Self::Coef1 => write!(f, "Coefficient 1/{:#04x}", self.value()),
            Self::Coef3 => write!(f, "Coefficient 3/{:#04x}", self.value()),
            Self::Coef7 => write!(f, "Coefficient 7/{:#04x}", self.value()),
            Self::Coef15 => write!(f, "Coefficient 15/{:#04x}", self.value()),
            Self::Coef31 => write!(f, "Coefficient 31/{:#04x}", self.value()),
            Self::Coef63 => write!(f, "Coefficient 63/{:#04x}", self.value()),
            Self::Coef127 => write!(f, "Coefficient 127/{:#04x}", self.value()),
        }
    }
}

/// Heater set point used for the gas measurement of a forced cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Bme680HeaterProfile {
    /// 320 °C for 197 ms.
    LowPower,
    /// 400 °C for 1943 ms.
    UltraLowPower,
    /// Caller supplied target temperature (°C) and duration (ms).
    Custom { temp_c: u16, duration_ms: u16 },
}

impl Bme680HeaterProfile {
    const BME680_HEATR_TEMP_LP: u16 = 320;
    const BME680_HEATR_TEMP_ULP: u16 = 400;
    const BME680_HEATR_DUR_MS_LP: u16 = 197;
    const BME680_HEATR_DUR_MS_ULP: u16 = 1943;

    pub const fn target_temp(&self) -> u16 {
        match *self {
            Self::LowPower => Self::BME680_HEATR_TEMP_LP,
            Self::UltraLowPower => Self::BME680_HEATR_TEMP_ULP,
            Self::Custom { temp_c, .. } => temp_c,
        }
    }

    pub const fn duration_ms(&self) -> u16 {
        match *self {
            Self::LowPower => Self::BME680_HEATR_DUR_MS_LP,
            Self::UltraLowPower => Self::BME680_HEATR_DUR_MS_ULP,
            Self::Custom { duration_ms, .. } => duration_ms,
        }
    }
}

impl fmt::Display for Bme680HeaterProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::LowPower => write!(f, "LowPower/{}C/{}ms", self.target_temp(), self.duration_ms()),
            Self::UltraLowPower => write!(f, "UltraLowPower/{}C/{}ms", self.target_temp(), self.duration_ms()),
            Self::Custom { temp_c, duration_ms } => write!(f, "Custom/{temp_c}C/{duration_ms}ms"),
        }
    }
}

/// Channels of the generic sensor read contract. The BME680 serves the first
/// four, everything else is rejected as unsupported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SensorChannel {
    AmbientTemp,
    Press,
    Humidity,
    GasRes,
    DieTemp,
    Altitude,
    Voc,
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Self::AmbientTemp => write!(f, "ambient temperature"),
            Self::Press => write!(f, "pressure"),
            Self::Humidity => write!(f, "humidity"),
            Self::GasRes => write!(f, "gas resistance"),
            Self::DieTemp => write!(f, "die temperature"),
            Self::Altitude => write!(f, "altitude"),
            Self::Voc => write!(f, "voc"),
        }
    }
}
