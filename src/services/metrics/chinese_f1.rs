//! 中文分词 F1
//!
//! 使用 jieba 分词，把两段文本各自看作去重后的词集合

use jieba_rs::Jieba;
use std::collections::HashSet;
use std::sync::LazyLock;

static JIEBA: LazyLock<Jieba> = LazyLock::new(Jieba::new);

/// 分词并去重，纯空白的词丢弃
pub fn token_set(text: &str) -> HashSet<&str> {
    JIEBA
        .cut(text, false)
        .into_iter()
        .filter(|w| !w.trim().is_empty())
        .collect()
}

/// 计算 F1
///
/// precision = |交集| / |生成答案词集|，recall = |交集| / |参考答案词集|，
/// 任一集合为空或 precision + recall 为 0 时返回 0
pub fn chinese_f1(reference: &str, generated: &str) -> f64 {
    let reference_set = token_set(reference);
    let generated_set = token_set(generated);
    f1_from_sets(&reference_set, &generated_set)
}

pub fn f1_from_sets(reference: &HashSet<&str>, generated: &HashSet<&str>) -> f64 {
    if reference.is_empty() || generated.is_empty() {
        return 0.0;
    }
    let overlap = reference.intersection(generated).count() as f64;
    let precision = overlap / generated.len() as f64;
    let recall = overlap / reference.len() as f64;
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_texts() {
        assert!((chinese_f1("我爱北京天安门", "我爱北京天安门") - 1.0).abs() < 1e-12);
        assert!((chinese_f1("Translate hello", "Translate hello") - 1.0).abs() < 1e-12);
        assert!((chinese_f1("2+2=?", "2+2=?") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_sets() {
        let a: HashSet<&str> = ["苹果", "香蕉"].into_iter().collect();
        let b: HashSet<&str> = ["汽车"].into_iter().collect();
        assert_eq!(f1_from_sets(&a, &b), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        let reference: HashSet<&str> = ["a", "b", "c", "d"].into_iter().collect();
        let generated: HashSet<&str> = ["a", "b"].into_iter().collect();
        // precision 1, recall 0.5
        assert!((f1_from_sets(&reference, &generated) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(chinese_f1("", ""), 0.0);
        assert_eq!(chinese_f1("你好", ""), 0.0);
        assert_eq!(chinese_f1("   ", "你好"), 0.0);
    }

    #[test]
    fn test_whitespace_tokens_ignored() {
        let set = token_set("hello world");
        assert!(set.contains("hello"));
        assert!(!set.contains(" "));
    }
}
