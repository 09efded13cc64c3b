use thiserror::Error;

/// A rule an ESS or VPP configuration breaks. Display text is what the operator sees.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    #[error("SOC 최소 < SOC 최대 이어야 합니다.")]
    SocBounds,
    #[error("정격용량(kWh)은 0보다 커야 합니다.")]
    Capacity,
    #[error("정격전력(kW)은 0보다 커야 합니다.")]
    RatedPower,
    #[error("충전 효율은 0~100% 범위여야 합니다.")]
    ChargeEfficiency,
    #[error("방전 효율은 0~100% 범위여야 합니다.")]
    DischargeEfficiency,
    #[error("온도 최소 < 최대 이어야 합니다.")]
    TemperatureBounds,
    #[error("MQTT 토픽을 입력하세요.")]
    MqttTopic,
    #[error("제어 계획 지평(분)은 0보다 커야 합니다.")]
    ControlHorizon,
    #[error("자원 {0}의 이름을 입력하세요.")]
    ResourceName(usize),
    #[error("자원 {0}의 감축 가능 전력(kW)을 입력하세요.")]
    ResourceShed(usize),
    #[error("자원 {0}의 최소 on/off 시간은 0 이상이어야 합니다.")]
    ResourceMinOnOff(usize),
    #[error("자원 {0}의 우선순위는 0~100 범위여야 합니다.")]
    ResourcePriority(usize),
    #[error("금지 시간대 형식이 올바르지 않습니다: {0}")]
    ForbiddenHours(String),
}

/// A failed validation, carrying every issue in rule order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", .0.first().map(ToString::to_string).unwrap_or_default())]
pub struct ValidationError(pub Vec<ConfigIssue>);

impl ValidationError {
    pub fn first(&self) -> Option<&ConfigIssue> {
        self.0.first()
    }

    pub fn messages(&self) -> Vec<String> {
        self.0.iter().map(ToString::to_string).collect()
    }
}
