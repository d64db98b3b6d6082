use std::collections::HashSet;

/// 静态封禁名单：命中显示名或号码任意一项即拒绝接入。
///
/// 与删除墓碑（tombstone）互相独立：封禁按资料匹配，墓碑按用户 id 匹配。
#[derive(Debug, Clone, Default)]
pub struct BanList {
    names: HashSet<String>,
    numbers: HashSet<String>,
}

impl BanList {
    pub fn new(
        names: impl IntoIterator<Item = String>,
        numbers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            names: names.into_iter().collect(),
            numbers: numbers.into_iter().collect(),
        }
    }

    pub fn name_banned(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn number_banned(&self, number: &str) -> bool {
        self.numbers.contains(number)
    }

    pub fn matches(&self, name: &str, number: Option<&str>) -> bool {
        self.name_banned(name) || number.is_some_and(|n| self.number_banned(n))
    }
}
