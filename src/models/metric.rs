//! 评估指标

use phf::phf_map;
use std::fmt;
use std::str::FromStr;

use crate::error::{AppError, AppResult, InputError};

/// 评估指标
///
/// 声明顺序即执行顺序，与用户选择的顺序无关
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Metric {
    Similarity,
    Rouge1,
    Rouge2,
    RougeL,
    ChineseF1,
}

static METRIC_KEYS: phf::Map<&'static str, Metric> = phf_map! {
    "similarity" => Metric::Similarity,
    "ass" => Metric::Similarity,
    "rouge-1" => Metric::Rouge1,
    "rouge-2" => Metric::Rouge2,
    "rouge-l" => Metric::RougeL,
    "chinese-f1" => Metric::ChineseF1,
    "f1" => Metric::ChineseF1,
};

impl Metric {
    pub const ALL: [Metric; 5] = [
        Metric::Similarity,
        Metric::Rouge1,
        Metric::Rouge2,
        Metric::RougeL,
        Metric::ChineseF1,
    ];

    /// 配置中使用的键
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Similarity => "similarity",
            Metric::Rouge1 => "rouge-1",
            Metric::Rouge2 => "rouge-2",
            Metric::RougeL => "rouge-l",
            Metric::ChineseF1 => "chinese-f1",
        }
    }

    /// 结果表中的列名
    pub fn column_name(&self) -> &'static str {
        match self {
            Metric::Similarity => "ASS值",
            Metric::Rouge1 => "ROUGE-1",
            Metric::Rouge2 => "ROUGE-2",
            Metric::RougeL => "ROUGE-L",
            Metric::ChineseF1 => "F1值",
        }
    }

    /// 解析用户选择的指标，去重并按固定顺序排列
    pub fn parse_selection<S: AsRef<str>>(keys: &[S]) -> AppResult<Vec<Metric>> {
        let mut metrics = keys
            .iter()
            .map(|k| k.as_ref().parse())
            .collect::<AppResult<Vec<Metric>>>()?;
        metrics.sort();
        metrics.dedup();
        Ok(metrics)
    }
}

impl FromStr for Metric {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('_', "-");
        METRIC_KEYS.get(key.as_str()).copied().ok_or_else(|| {
            InputError::UnknownMetric {
                key: s.to_string(),
            }
            .into()
        })
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}
